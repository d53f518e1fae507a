//! Query formatting and final-answer extraction.
//!
//! Every query embeds an answer-file contract: the agent must write
//! `FINAL ANSWER: <answer>` into a file at an absolute path chosen by the
//! harness. The harness later reads that file back with
//! [`read_final_answer`].

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::dataset::GaiaTask;

/// Marker that precedes the answer in the output file.
pub const FINAL_ANSWER_MARKER: &str = "FINAL ANSWER: ";

/// Formatting rules of the GAIA answer template.
pub const ANSWER_FORMAT_RULES: &str = "YOUR FINAL ANSWER should be a number OR as few words as possible OR a comma separated list of numbers and/or strings. \
If you are asked for a number, don't use comma to write your number neither use units such as $ or percent sign unless specified otherwise. \
If you are asked for a string, don't use articles, neither abbreviations (e.g. for cities), and write the digits in plain text unless specified otherwise. \
If you are asked for a comma separated list, apply the above rules depending of whether the element to be put in the list is a number or a string.";

/// Convert a task into the natural-language query handed to the society.
pub fn task_to_query(task: &GaiaTask, output_file: &Path) -> String {
    let mut query = format!("Your task is: {}", task.question);

    if task.has_attachment() {
        let path = task
            .file_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(&task.file_name));
        query.push_str(&format!(
            "\n{} is the absolute file path you need to use.",
            path.display()
        ));
    }

    query.push_str(&format!(
        "\nWrite down your answer to file {} with the following template: {}[YOUR FINAL ANSWER]. {}",
        absolute_path(output_file).display(),
        FINAL_ANSWER_MARKER,
        ANSWER_FORMAT_RULES
    ));

    query
}

/// Extract the answer from the content of an output file.
///
/// Some agents write the Python repr of a one-element list (`['FINAL ANSWER: x']`),
/// so a leading `['` and trailing `']` are stripped first.
pub fn parse_final_answer(content: &str) -> Option<String> {
    if !content.contains(FINAL_ANSWER_MARKER) {
        return None;
    }

    let body = if content.starts_with("['") {
        strip_list_repr(content)
    } else {
        content
    };

    body.split(FINAL_ANSWER_MARKER)
        .nth(1)
        .map(|answer| answer.trim().to_string())
}

/// Read an output file and extract its final answer.
pub fn read_final_answer(path: &Path) -> io::Result<Option<String>> {
    let content = fs::read_to_string(path)?;
    Ok(parse_final_answer(&content))
}

fn strip_list_repr(content: &str) -> &str {
    let chars: Vec<(usize, char)> = content.char_indices().collect();
    if chars.len() < 4 {
        return "";
    }
    let start = chars[2].0;
    let end = chars[chars.len() - 2].0;
    &content[start..end]
}

fn absolute_path(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    match std::env::current_dir() {
        Ok(cwd) => cwd.join(path),
        Err(_) => path.to_path_buf(),
    }
}
