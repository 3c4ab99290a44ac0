//! Prompt text for the file mapping request.

use crate::error::MutationError;

const MAPPING_PREAMBLE: &str = r#"Create a high level file mapping used to perform changes on or generate files in a code base.
Respond with the mapping in a json format.
If nothing should happen to the file structure, which often happens when the instructions are intended for the code inside of files, use the "operation" "none".
If a file is to be deleted, use the "operation" "delete".
If a file is to be renamed, use the "operation" "rename".
If a file is to be added, use the "operation" "add".
If a file is to be expanded into multiple files, use the "operation" "expand".
Example 1:
Input:
Instructions: "convert javascript to typescript"
["src/test.js", "src/testTwo.js"]
Output:
{
  "src/test.js": {
    "operation": "rename",
    "name": "src/test.ts"
  },
  "src/testTwo.js": {
    "operation": "rename",
    "name": "src/testTwo.ts"
  }
}
Example 2:
Input:
Instructions: "convert usage of the "async" package to use "async/await""
["src/index.js", "src/main.js"]
Output:
{
  "src/index.js": {
    "operation": "none"
  },
  "src/main.js": {
    "operation": "none"
  }
}
Example 3:
Input:
Instructions: "create a basic node js package and repo with eslint"
[]
Output:
{
  "index.js": {
    "operation": "add"
  },
  "package.json": {
    "operation": "add"
  },
  ".gitignore": {
    "operation": "add"
  },
  ".eslintrc.js": {
    "operation": "add"
  }
}
Now it's your turn.
Input:
"#;

/// Build the mapping prompt for `instruction` over `file_names`.
///
/// Fails with [`MutationError::EmptyWorkspace`] when there is nothing to map;
/// bootstrapping a project from an empty tree is not supported.
pub fn create_mapping_prompt(
    instruction: &str,
    file_names: &[String],
) -> Result<String, MutationError> {
    if file_names.is_empty() {
        return Err(MutationError::EmptyWorkspace);
    }

    let quoted: Vec<String> = file_names
        .iter()
        .map(|name| serde_json::Value::String(name.clone()).to_string())
        .collect();

    Ok(format!(
        "{}Instructions: \"{}\"\n[{}]\nOutput:\n",
        MAPPING_PREAMBLE,
        instruction,
        quoted.join(", ")
    ))
}
