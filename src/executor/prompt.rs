//! Edit prompts and reply parsing.

use tracing::warn;

/// Marks the start and end of file contents in a conversational reply.
pub const FILE_CONTENTS_SENTINEL: &str = "@@@";

/// Instruction sent with every independent edit request.
pub fn create_edit_prompt(instruction: &str) -> String {
    format!(
        "You are doing a coding task, however, you are only performing one part of these instructions.\n\
         You will be given one file's contents as input and then requested to give output.\n\
         The entire task is: \"{}\"",
        instruction
    )
}

/// Per-file turn for conversational editing.
pub fn create_chat_edit_prompt(
    file_name: &str,
    output_file_name: &str,
    file_contents: &str,
) -> String {
    let target = if file_name != output_file_name {
        format!(
            "going to be renamed from \"{}\" to \"{}\"",
            file_name, output_file_name
        )
    } else {
        format!("named: \"{}\"", file_name)
    };

    format!(
        "Now we are going file by file and following the mapping and instructions from the first question.\n\
         The file to edit now is {}.\n\
         Respond only with the updated file contents.\n\
         Mark the start and end of the file contents with the symbol \"{}\"\n\
         Everything after this line is the file contents:\n\
         {}",
        target, FILE_CONTENTS_SENTINEL, file_contents
    )
}

pub const DESCRIPTION_PROMPT: &str = "Give a summary of the changes made, do not refer to our conversation, only the prompt that was given in the first question.";

/// File contents pulled out of a chat reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extracted {
    pub text: String,
    /// The reply had no sentinel and was used verbatim.
    pub used_fallback: bool,
}

/// Take the text between the first and second sentinel, or from the first
/// sentinel to the end when there is only one.
///
/// Without any sentinel the whole reply is returned and flagged, since a
/// conversational preamble would then end up in the file.
pub fn extract_file_contents(file_name: &str, reply: &str) -> Extracted {
    let mut parts = reply.split(FILE_CONTENTS_SENTINEL);
    let before = parts.next();
    match (before, parts.next()) {
        (_, Some(inner)) => Extracted {
            text: inner.to_string(),
            used_fallback: false,
        },
        _ => {
            warn!(
                "Reply for \"{}\" has no {} markers; using the whole reply as file contents",
                file_name, FILE_CONTENTS_SENTINEL
            );
            Extracted {
                text: reply.to_string(),
                used_fallback: true,
            }
        }
    }
}
