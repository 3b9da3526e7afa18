use super::xml::escape_xml;
use super::{columns, RecordEncoder};
use crate::core::{ExportFormat, Record};
use crate::domain::model::value_text;
use crate::utils::error::Result;
use serde_json::Value;
use std::io::Write;
use zip::write::{SimpleFileOptions, ZipWriter};
use zip::CompressionMethod;

pub const SHEET_NAME: &str = "Reporte";

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/><Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/><Override PartName="/xl/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml"/></Types>"#;

const PACKAGE_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/></Relationships>"#;

const WORKBOOK_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/><Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/></Relationships>"#;

// 樣式 0 = 一般儲存格，樣式 1 = 粗體標題
const STYLES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><fonts count="2"><font><sz val="11"/><name val="Calibri"/></font><font><b/><sz val="11"/><name val="Calibri"/></font></fonts><fills count="2"><fill><patternFill patternType="none"/></fill><fill><patternFill patternType="gray125"/></fill></fills><borders count="1"><border><left/><right/><top/><bottom/><diagonal/></border></borders><cellStyleXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0"/></cellStyleXfs><cellXfs count="2"><xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0"/><xf numFmtId="0" fontId="1" fillId="0" borderId="0" xfId="0" applyFont="1"/></cellXfs><cellStyles count="1"><cellStyle name="Normal" xfId="0" builtinId="0"/></cellStyles></styleSheet>"#;

/// Single sheet Office Open XML workbook.
#[derive(Debug, Clone, Copy, Default)]
pub struct XlsxEncoder;

impl RecordEncoder for XlsxEncoder {
    fn format(&self) -> ExportFormat {
        ExportFormat::Xlsx
    }

    fn encode(&self, records: &[Record]) -> Result<Vec<u8>> {
        let header = columns(self.format(), records)?;
        let sheet = worksheet_xml(&header, records);

        let mut zip = ZipWriter::new(std::io::Cursor::new(Vec::new()));

        let parts = [
            ("[Content_Types].xml", CONTENT_TYPES.to_string()),
            ("_rels/.rels", PACKAGE_RELS.to_string()),
            ("xl/workbook.xml", workbook_xml()),
            ("xl/_rels/workbook.xml.rels", WORKBOOK_RELS.to_string()),
            ("xl/styles.xml", STYLES.to_string()),
            ("xl/worksheets/sheet1.xml", sheet),
        ];
        for (name, content) in parts {
            zip.start_file(name, file_options())?;
            zip.write_all(content.as_bytes())?;
        }

        let cursor = zip.finish()?;
        tracing::debug!("Built workbook with {} data rows", records.len());
        Ok(cursor.into_inner())
    }
}

fn file_options() -> SimpleFileOptions {
    SimpleFileOptions::default().compression_method(CompressionMethod::Deflated)
}

fn workbook_xml() -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets><sheet name="{}" sheetId="1" r:id="rId1"/></sheets></workbook>"#,
        SHEET_NAME
    )
}

fn worksheet_xml(header: &[String], records: &[Record]) -> String {
    let mut xml = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>"#,
    );

    xml.push_str(r#"<row r="1">"#);
    for (col, label) in header.iter().enumerate() {
        xml.push_str(&inline_string_cell(&cell_ref(col, 1), label, Some(1)));
    }
    xml.push_str("</row>");

    for (index, record) in records.iter().enumerate() {
        let row = index + 2;
        xml.push_str(&format!(r#"<row r="{}">"#, row));
        for (col, value) in record.values().enumerate() {
            xml.push_str(&value_cell(&cell_ref(col, row), value));
        }
        xml.push_str("</row>");
    }

    xml.push_str("</sheetData></worksheet>");
    xml
}

fn value_cell(reference: &str, value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Number(n) => format!(r#"<c r="{}"><v>{}</v></c>"#, reference, n),
        Value::Bool(b) => format!(
            r#"<c r="{}" t="b"><v>{}</v></c>"#,
            reference,
            if *b { 1 } else { 0 }
        ),
        other => inline_string_cell(reference, &value_text(other), None),
    }
}

fn inline_string_cell(reference: &str, text: &str, style: Option<u8>) -> String {
    let style_attr = style.map(|s| format!(r#" s="{}""#, s)).unwrap_or_default();
    format!(
        r#"<c r="{}" t="inlineStr"{}><is><t xml:space="preserve">{}</t></is></c>"#,
        reference,
        style_attr,
        escape_xml(text)
    )
}

/// Zero based column + one based row to an A1 reference.
pub fn cell_ref(col: usize, row: usize) -> String {
    format!("{}{}", column_name(col), row)
}

pub fn column_name(mut index: usize) -> String {
    let mut letters = Vec::new();
    loop {
        letters.push((b'A' + (index % 26) as u8) as char);
        if index < 26 {
            break;
        }
        index = index / 26 - 1;
    }
    letters.iter().rev().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    fn read_part(bytes: &[u8], name: &str) -> String {
        let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes)).unwrap();
        let mut file = archive.by_name(name).unwrap();
        let mut content = String::new();
        file.read_to_string(&mut content).unwrap();
        content
    }

    fn pagos() -> Vec<Record> {
        vec![
            Record::new()
                .with("Estudiante", "Ana & Co")
                .with("Monto", 30.5)
                .with("Pagado", true),
            Record::new()
                .with("Estudiante", "Luis")
                .with("Monto", 45)
                .with("Pagado", false),
            Record::new()
                .with("Estudiante", "  Marta ")
                .with("Monto", Value::Null)
                .with("Pagado", true),
        ]
    }

    #[test]
    fn test_package_parts() {
        let bytes = XlsxEncoder.encode(&pagos()).unwrap();
        let archive = zip::ZipArchive::new(std::io::Cursor::new(bytes.as_slice())).unwrap();

        let mut names: Vec<&str> = archive.file_names().collect();
        names.sort();
        assert_eq!(
            names,
            vec![
                "[Content_Types].xml",
                "_rels/.rels",
                "xl/_rels/workbook.xml.rels",
                "xl/styles.xml",
                "xl/workbook.xml",
                "xl/worksheets/sheet1.xml",
            ]
        );
        assert!(read_part(&bytes, "xl/workbook.xml").contains(r#"<sheet name="Reporte""#));
    }

    #[test]
    fn test_rows_and_columns_match_input() {
        let records = pagos();
        let bytes = XlsxEncoder.encode(&records).unwrap();
        let sheet = read_part(&bytes, "xl/worksheets/sheet1.xml");

        assert_eq!(sheet.matches("<row ").count(), records.len() + 1);

        let header_row = sheet
            .split("</row>")
            .next()
            .unwrap();
        assert_eq!(header_row.matches("<c ").count(), 3);
        let a1 = header_row.find(">Estudiante<").unwrap();
        let b1 = header_row.find(">Monto<").unwrap();
        let c1 = header_row.find(">Pagado<").unwrap();
        assert!(a1 < b1 && b1 < c1);

        assert!(sheet.contains(r#"<c r="A2" t="inlineStr"><is><t xml:space="preserve">Ana &amp; Co</t></is></c>"#));
        assert!(sheet.contains(r#"<c r="B2"><v>30.5</v></c>"#));
        assert!(sheet.contains(r#"<c r="C3" t="b"><v>0</v></c>"#));
        assert!(!sheet.contains(r#"r="B4""#));
        assert!(sheet.contains(">  Marta <"));
    }

    #[test]
    fn test_column_names() {
        assert_eq!(column_name(0), "A");
        assert_eq!(column_name(25), "Z");
        assert_eq!(column_name(26), "AA");
        assert_eq!(column_name(27), "AB");
        assert_eq!(column_name(701), "ZZ");
        assert_eq!(column_name(702), "AAA");
        assert_eq!(cell_ref(2, 10), "C10");
    }
}
