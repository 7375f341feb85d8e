use std::io::{Read, Write};

use tracing::warn;

use super::{LandmarkDocument, LandmarkError, Side, Vec3};

/// A landmark read from CSV. Rows may or may not carry a name.
#[derive(Debug, Clone, PartialEq)]
pub struct CsvLandmark {
    pub name: Option<String>,
    pub position: Vec3,
}

/// Output options for CSV writers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CsvFlags {
    pub no_header: bool,
    pub no_names: bool,
}

fn parse_position(fields: &[&str]) -> Option<Vec3> {
    match fields {
        [x, y, z] => Some(Vec3::new(x.parse().ok()?, y.parse().ok()?, z.parse().ok()?)),
        _ => None,
    }
}

fn parse_row(record: &::csv::StringRecord) -> Option<CsvLandmark> {
    let fields: Vec<&str> = record.iter().collect();
    match fields.len() {
        3 => Some(CsvLandmark {
            name: None,
            position: parse_position(&fields)?,
        }),
        n if n >= 4 => {
            let name = fields[0];
            Some(CsvLandmark {
                name: (!name.is_empty()).then(|| name.to_string()),
                position: parse_position(&fields[1..4])?,
            })
        }
        _ => None,
    }
}

/// Read landmarks from `x,y,z` or `name,x,y,z` rows.
///
/// A first row that does not parse is treated as a header. Later rows that
/// do not parse are skipped with a warning.
pub fn read_landmarks<R: Read>(reader: R) -> Result<Vec<CsvLandmark>, LandmarkError> {
    let mut csv_reader = ::csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(::csv::Trim::All)
        .from_reader(reader);

    let mut landmarks = Vec::new();
    for (idx, record) in csv_reader.records().enumerate() {
        let record = record?;
        if record.iter().all(str::is_empty) {
            continue;
        }
        match parse_row(&record) {
            Some(landmark) => landmarks.push(landmark),
            None if idx == 0 => {}
            None => warn!(row = idx + 1, "skipping malformed landmark row"),
        }
    }

    Ok(landmarks)
}

fn write_rows<W, I>(writer: W, header: &[&str], rows: I, flags: CsvFlags) -> Result<(), LandmarkError>
where
    W: Write,
    I: IntoIterator<Item = (String, Vec<f64>)>,
{
    let mut csv_writer = ::csv::WriterBuilder::new()
        .flexible(false)
        .from_writer(writer);

    if !flags.no_header {
        let columns = if flags.no_names { &header[1..] } else { header };
        csv_writer.write_record(columns)?;
    }

    for (name, coords) in rows {
        let mut record: Vec<String> = Vec::with_capacity(coords.len() + 1);
        if !flags.no_names {
            record.push(name);
        }
        record.extend(coords.iter().map(f64::to_string));
        csv_writer.write_record(&record)?;
    }

    csv_writer.flush()?;
    Ok(())
}

/// Write the locations of one side of every pair that has that side
pub fn write_side<W: Write>(
    doc: &LandmarkDocument,
    side: Side,
    writer: W,
    flags: CsvFlags,
) -> Result<(), LandmarkError> {
    let rows = doc.pairs.iter().filter_map(|p| {
        p.location(side)
            .map(|v| (p.name.clone(), vec![v.x, v.y, v.z]))
    });
    write_rows(writer, &["name", "x", "y", "z"], rows, flags)
}

/// Write every fully paired landmark as one row
pub fn write_pairs<W: Write>(doc: &LandmarkDocument, writer: W, flags: CsvFlags) -> Result<(), LandmarkError> {
    let rows = doc.pairs.iter().filter_map(|p| match (p.source, p.destination) {
        (Some(s), Some(d)) => Some((p.name.clone(), vec![s.x, s.y, s.z, d.x, d.y, d.z])),
        _ => None,
    });
    write_rows(
        writer,
        &["name", "source.x", "source.y", "source.z", "dest.x", "dest.y", "dest.z"],
        rows,
        flags,
    )
}

pub fn write_non_participating<W: Write>(
    doc: &LandmarkDocument,
    writer: W,
    flags: CsvFlags,
) -> Result<(), LandmarkError> {
    let rows = doc
        .non_participating
        .iter()
        .map(|l| (l.name.clone(), vec![l.location.x, l.location.y, l.location.z]));
    write_rows(writer, &["name", "x", "y", "z"], rows, flags)
}
