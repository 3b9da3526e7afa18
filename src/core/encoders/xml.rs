use super::{columns, RecordEncoder};
use crate::core::{ExportFormat, Record};
use crate::domain::model::value_text;
use crate::utils::error::Result;

pub const ROOT_ELEMENT: &str = "rows";
pub const ROW_ELEMENT: &str = "row";

/// `<rows><row><campo>valor</campo>...</row></rows>`
#[derive(Debug, Clone, Copy, Default)]
pub struct XmlEncoder;

impl RecordEncoder for XmlEncoder {
    fn format(&self) -> ExportFormat {
        ExportFormat::Xml
    }

    fn encode(&self, records: &[Record]) -> Result<Vec<u8>> {
        let names: Vec<String> = columns(self.format(), records)?
            .iter()
            .map(|key| element_name(key))
            .collect();

        let mut xml = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
        xml.push_str(&format!("<{}>\n", ROOT_ELEMENT));

        for record in records {
            xml.push_str(&format!("  <{}>\n", ROW_ELEMENT));
            for (name, value) in names.iter().zip(record.values()) {
                xml.push_str(&format!(
                    "    <{name}>{}</{name}>\n",
                    escape_xml(&value_text(value))
                ));
            }
            xml.push_str(&format!("  </{}>\n", ROW_ELEMENT));
        }
        xml.push_str(&format!("</{}>", ROOT_ELEMENT));

        Ok(xml.into_bytes())
    }
}

/// Escapes the five reserved characters and drops code points XML 1.0
/// cannot carry. `\r` is written as a character reference so parsers do not
/// fold it into a line feed.
pub fn escape_xml(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            '\r' => escaped.push_str("&#13;"),
            '\t' | '\n' => escaped.push(c),
            c if (c as u32) < 0x20 || c == '\u{FFFE}' || c == '\u{FFFF}' => {}
            c => escaped.push(c),
        }
    }
    escaped
}

/// Element name for a record key. Whitespace runs become `_`; anything else
/// that cannot appear in an XML name is replaced as well.
pub fn element_name(key: &str) -> String {
    let mut name = String::with_capacity(key.len());
    let mut in_whitespace = false;

    for c in key.trim().chars() {
        if c.is_whitespace() {
            if !in_whitespace {
                name.push('_');
            }
            in_whitespace = true;
            continue;
        }
        in_whitespace = false;

        if is_name_char(c) {
            name.push(c);
        } else {
            name.push('_');
        }
    }

    match name.chars().next() {
        None => "_".to_string(),
        Some(first) if is_name_start_char(first) => name,
        Some(_) => format!("_{}", name),
    }
}

/// XML 1.0 NameStartChar without `:`, which is kept out of element names.
fn is_name_start_char(c: char) -> bool {
    matches!(c,
        'A'..='Z'
        | '_'
        | 'a'..='z'
        | '\u{C0}'..='\u{D6}'
        | '\u{D8}'..='\u{F6}'
        | '\u{F8}'..='\u{2FF}'
        | '\u{370}'..='\u{37D}'
        | '\u{37F}'..='\u{1FFF}'
        | '\u{200C}'..='\u{200D}'
        | '\u{2070}'..='\u{218F}'
        | '\u{2C00}'..='\u{2FEF}'
        | '\u{3001}'..='\u{D7FF}'
        | '\u{F900}'..='\u{FDCF}'
        | '\u{FDF0}'..='\u{FFFD}'
        | '\u{10000}'..='\u{EFFFF}')
}

fn is_name_char(c: char) -> bool {
    is_name_start_char(c)
        || matches!(c,
            '-' | '.' | '0'..='9' | '\u{B7}' | '\u{300}'..='\u{36F}' | '\u{203F}'..='\u{2040}')
}
