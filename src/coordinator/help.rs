//! Static help payload

use crate::agent::CapabilityRegistry;
use crate::command::rules::creatable_types;
use crate::command::HELP_SYNONYMS;

/// Command grammar followed by the registry listing
pub fn help_payload(registry: &CapabilityRegistry) -> String {
    let types: Vec<&str> = creatable_types().collect();
    let synonyms = HELP_SYNONYMS
        .iter()
        .map(|s| format!("\"{s}\""))
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "AVAILABLE COMMANDS:\n\
         - create <type> <name> [with content: <text>]  (types: {types})\n\
         - list <files|documents|scripts|agents|commands|memory> [in <location>]\n\
         - analyze <json|text|code|data|file>[: <content or name.ext>]\n\
         - search [for] <query> [in <source>]\n\
         - schedule <type> <description> [for <time>]\n\
         - read <name.ext>\n\
         - delete <name.ext>\n\
         - help: {synonyms}\n\
         Anything else is answered by the most suitable agent.\n\n\
         {listing}",
        types = types.join(", "),
        listing = registry.capability_listing()
    )
}
