//! Rich-text content of text shapes.
//!
//! Text content is a small tree: a root node whose first child holds the
//! paragraphs, each paragraph holding styled runs (`children`) with a `text`
//! field. Editing only rewrites run text so paragraph and run styling
//! survives.

use serde_json::{Map, Value};

use crate::error::ToolError;

/// Paragraphs of a content tree (`children[0].children`).
pub fn paragraphs_mut(content: &mut Value) -> Option<&mut Vec<Value>> {
    content
        .get_mut("children")?
        .get_mut(0)?
        .get_mut("children")?
        .as_array_mut()
}

/// Runs of a paragraph, if it has any.
fn runs(paragraph: &Value) -> Option<&Vec<Value>> {
    paragraph
        .get("children")
        .and_then(Value::as_array)
        .filter(|runs| !runs.is_empty())
}

/// Applies `f` to every run object of every paragraph.
pub fn for_each_run(paragraphs: &mut [Value], mut f: impl FnMut(&mut Map<String, Value>)) {
    for paragraph in paragraphs {
        if let Some(runs) = paragraph.get_mut("children").and_then(Value::as_array_mut) {
            for run in runs.iter_mut().filter_map(Value::as_object_mut) {
                f(run);
            }
        }
    }
}

/// Replaces the text carried by `paragraphs` with `text`.
///
/// Line N of the input goes into the first run of paragraph N and every
/// other run is blanked. Paragraphs without runs get a copy of the first
/// run found in the document. Lines beyond the paragraph count are joined
/// with `\n` onto the last paragraph; no paragraph nodes are created.
///
/// # Errors
///
/// Fails when there are no paragraphs or no run to use as a template.
pub fn set_text_content(paragraphs: &mut [Value], text: &str) -> Result<(), ToolError> {
    if paragraphs.is_empty() {
        return Err(ToolError::validation(
            "Text shape has no paragraph structure to update",
        ));
    }

    let template = paragraphs
        .iter()
        .find_map(|p| runs(p).and_then(|runs| runs.first()))
        .cloned()
        .ok_or_else(|| ToolError::validation("Text shape has no text nodes to update"))?;

    let blank_run = || {
        let mut run = template.clone();
        if let Some(obj) = run.as_object_mut() {
            obj.insert("text".into(), Value::String(String::new()));
        }
        run
    };

    let lines: Vec<&str> = text
        .split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .collect();

    for (index, paragraph) in paragraphs.iter_mut().enumerate() {
        let Some(obj) = paragraph.as_object_mut() else {
            continue;
        };
        let children = obj
            .entry("children")
            .or_insert_with(|| Value::Array(Vec::new()));
        if !children.as_array().is_some_and(|runs| !runs.is_empty()) {
            *children = Value::Array(vec![blank_run()]);
        }
        let Some(runs) = children.as_array_mut() else {
            continue;
        };

        let line = lines.get(index).copied().unwrap_or_default();
        for (run_index, run) in runs.iter_mut().enumerate() {
            if let Some(run) = run.as_object_mut() {
                let text = if run_index == 0 { line } else { "" };
                run.insert("text".into(), Value::String(text.to_string()));
            }
        }
    }

    if lines.len() > paragraphs.len() {
        let overflow = lines[paragraphs.len()..].join("\n");
        let last_first_run = paragraphs
            .last_mut()
            .and_then(|p| p.get_mut("children"))
            .and_then(|c| c.get_mut(0))
            .and_then(Value::as_object_mut);
        if let Some(run) = last_first_run {
            let current = run.get("text").and_then(Value::as_str).unwrap_or_default();
            let joined = if current.is_empty() {
                overflow
            } else {
                format!("{current}\n{overflow}")
            };
            run.insert("text".into(), Value::String(joined));
        }
    }

    Ok(())
}

/// Plain text of a content tree: runs concatenated, paragraphs joined by `\n`.
#[must_use]
pub fn plain_text(content: &Value) -> String {
    let Some(paragraphs) = content
        .get("children")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("children"))
        .and_then(Value::as_array)
    else {
        return String::new();
    };

    paragraphs
        .iter()
        .map(|paragraph| {
            runs(paragraph)
                .map(|runs| {
                    runs.iter()
                        .filter_map(|run| run.get("text").and_then(Value::as_str))
                        .collect::<String>()
                })
                .unwrap_or_default()
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// A fresh single-paragraph content tree carrying `text` with basic styling.
#[must_use]
pub fn new_content(text: &str, font_size: f64, font_family: &str, fill_color: &str) -> Value {
    let run = serde_json::json!({
        "text": text,
        "fontSize": format_font_size(font_size),
        "fontFamily": font_family,
        "fontId": font_id(font_family),
        "fontVariantId": "regular",
        "fontWeight": "400",
        "fontStyle": "normal",
        "fills": [{"fillColor": fill_color, "fillOpacity": 1}],
    });

    serde_json::json!({
        "type": "root",
        "children": [{
            "type": "paragraph-set",
            "children": [{
                "type": "paragraph",
                "children": [run],
            }],
        }],
    })
}

/// Font sizes are stored as strings; integral sizes drop the fraction.
#[must_use]
pub fn format_font_size(size: f64) -> String {
    if size.fract() == 0.0 && size.abs() < 1e15 {
        format!("{size:.0}")
    } else {
        size.to_string()
    }
}

fn font_id(family: &str) -> String {
    format!("gfont-{}", family.to_ascii_lowercase().replace(' ', "-"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn styled_content() -> Value {
        json!({
            "type": "root",
            "children": [{
                "type": "paragraph-set",
                "children": [
                    {"type": "paragraph", "textAlign": "center", "children": [
                        {"text": "Hello ", "fontWeight": "700", "fontStyle": "italic"},
                        {"text": "world", "fontWeight": "400"}
                    ]},
                    {"type": "paragraph", "children": [
                        {"text": "Second", "fontWeight": "700", "fontStyle": "italic"}
                    ]}
                ]
            }]
        })
    }

    #[test]
    fn lines_map_to_paragraphs() {
        let mut content = styled_content();
        let paragraphs = paragraphs_mut(&mut content).unwrap();
        set_text_content(paragraphs, "One\r\nTwo").unwrap();

        assert_eq!(plain_text(&content), "One\nTwo");
        let p0 = &content["children"][0]["children"][0];
        assert_eq!(p0["textAlign"], "center");
        assert_eq!(p0["children"][0]["fontWeight"], "700");
        assert_eq!(p0["children"][0]["fontStyle"], "italic");
        assert_eq!(p0["children"][1]["text"], "");
        assert_eq!(p0["children"][1]["fontWeight"], "400");
    }

    #[test]
    fn overflow_appends_to_last_paragraph() {
        let mut content = styled_content();
        let paragraphs = paragraphs_mut(&mut content).unwrap();
        set_text_content(paragraphs, "a\nb\nc\nd").unwrap();

        let paragraphs = content["children"][0]["children"].as_array().unwrap();
        assert_eq!(paragraphs.len(), 2);
        assert_eq!(paragraphs[1]["children"][0]["text"], "b\nc\nd");
    }

    #[test]
    fn fewer_lines_blank_remaining_paragraphs() {
        let mut content = styled_content();
        let paragraphs = paragraphs_mut(&mut content).unwrap();
        set_text_content(paragraphs, "only").unwrap();
        assert_eq!(content["children"][0]["children"][1]["children"][0]["text"], "");
    }

    #[test]
    fn paragraph_without_runs_gets_template_copy() {
        let mut paragraphs = vec![
            json!({"type": "paragraph", "children": []}),
            json!({"type": "paragraph", "children": [{"text": "x", "fontSize": "18"}]}),
        ];
        set_text_content(&mut paragraphs, "first\nsecond").unwrap();
        assert_eq!(paragraphs[0]["children"][0]["text"], "first");
        assert_eq!(paragraphs[0]["children"][0]["fontSize"], "18");
    }

    #[test]
    fn no_structure_is_an_error() {
        let mut empty: Vec<Value> = Vec::new();
        assert!(set_text_content(&mut empty, "x").is_err());

        let mut no_runs = vec![json!({"type": "paragraph", "children": []})];
        assert!(set_text_content(&mut no_runs, "x").is_err());
    }

    #[test]
    fn font_size_formatting() {
        assert_eq!(format_font_size(14.0), "14");
        assert_eq!(format_font_size(12.5), "12.5");
    }
}
