use super::{columns, RecordEncoder};
use crate::core::{ExportFormat, Record};
use crate::domain::model::value_text;
use crate::utils::error::{ExportError, Result};

/// Comma separated text with a header row.
#[derive(Debug, Clone, Copy, Default)]
pub struct CsvEncoder;

impl RecordEncoder for CsvEncoder {
    fn format(&self) -> ExportFormat {
        ExportFormat::Csv
    }

    fn encode(&self, records: &[Record]) -> Result<Vec<u8>> {
        let header = columns(self.format(), records)?;

        let mut writer = csv::WriterBuilder::new().from_writer(Vec::new());
        writer.write_record(&header)?;
        for record in records {
            writer.write_record(record.values().map(value_text))?;
        }
        writer.flush()?;

        writer
            .into_inner()
            .map_err(|e| ExportError::IoError(e.into_error()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(bytes: &[u8]) -> (Vec<String>, Vec<Vec<String>>) {
        let mut reader = csv::Reader::from_reader(bytes);
        let header = reader
            .headers()
            .unwrap()
            .iter()
            .map(str::to_string)
            .collect();
        let rows = reader
            .records()
            .map(|r| r.unwrap().iter().map(str::to_string).collect())
            .collect();
        (header, rows)
    }

    #[test]
    fn test_rows_and_columns_match_input() {
        let records = vec![
            Record::new().with("Curso", "Álgebra").with("Precio", 25.5).with("Activo", true),
            Record::new().with("Curso", "Cálculo").with("Precio", 40).with("Activo", false),
            Record::new()
                .with("Curso", "Física")
                .with("Precio", serde_json::Value::Null)
                .with("Activo", true),
        ];

        let bytes = CsvEncoder.encode(&records).unwrap();
        let (header, rows) = parse(&bytes);

        assert_eq!(header, vec!["Curso", "Precio", "Activo"]);
        assert_eq!(rows.len(), 3);
        assert!(rows.iter().all(|row| row.len() == 3));
        assert_eq!(rows[0], vec!["Álgebra", "25.5", "true"]);
        assert_eq!(rows[2], vec!["Física", "", "true"]);
    }

    #[test]
    fn test_special_characters_round_trip() {
        let tricky = [
            "Pérez, Juan",
            "dijo \"hola\"",
            "línea uno\nlínea dos",
            "todo, \"junto\"\r\nya",
        ];
        let records: Vec<Record> = tricky
            .iter()
            .map(|value| Record::new().with("comentario", *value).with("id", 1))
            .collect();

        let bytes = CsvEncoder.encode(&records).unwrap();
        let text = String::from_utf8(bytes.clone()).unwrap();
        assert!(text.contains("\"Pérez, Juan\""));
        assert!(text.contains("\"dijo \"\"hola\"\"\""));

        let (_, rows) = parse(&bytes);
        let decoded: Vec<&str> = rows.iter().map(|row| row[0].as_str()).collect();
        assert_eq!(decoded, tricky);
    }

    #[test]
    fn test_inconsistent_records_fail() {
        let records = vec![
            Record::new().with("a", 1),
            Record::new().with("b", 2),
        ];
        assert!(CsvEncoder.encode(&records).is_err());
    }
}
