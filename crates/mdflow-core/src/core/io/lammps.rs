use super::traits::TrajectoryFile;
use crate::core::geometry::PeriodicCell;
use crate::core::snapshot::{Snapshot, SnapshotError};
use nalgebra::{Point3, Vector3};
use std::io::{self, BufRead, Write};
use thiserror::Error;

/// Column layout written for every atom line, in order.
pub const ATOM_COLUMNS: &str = "id type x y z vx vy vz";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DumpMetadata {
    pub timestep: u64,
}

#[derive(Debug, Error)]
pub enum TrajError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Parse error on line {line}: {kind}")]
    Parse {
        line: usize,
        kind: TrajParseErrorKind,
    },

    #[error("Inconsistent data: {0}")]
    Inconsistency(String),

    #[error("Missing required section: {0}")]
    MissingSection(&'static str),
}

#[derive(Debug, Error)]
pub enum TrajParseErrorKind {
    #[error("Invalid integer (value: '{value}')")]
    InvalidInt { value: String },

    #[error("Invalid float (value: '{value}')")]
    InvalidFloat { value: String },

    #[error("Atom record needs {expected} fields, found {found}")]
    ShortAtomRecord { expected: usize, found: usize },

    #[error("Unexpected end of section")]
    UnexpectedEof,

    #[error("Unsupported column layout '{found}' (expected '{expected}')")]
    UnsupportedColumns { expected: String, found: String },
}

impl From<SnapshotError> for TrajError {
    fn from(err: SnapshotError) -> Self {
        TrajError::Inconsistency(err.to_string())
    }
}

fn parse_u64(value: &str, line: usize) -> Result<u64, TrajError> {
    value.trim().parse().map_err(|_| TrajError::Parse {
        line,
        kind: TrajParseErrorKind::InvalidInt {
            value: value.trim().to_string(),
        },
    })
}

fn parse_f64(value: &str, line: usize) -> Result<f64, TrajError> {
    value.trim().parse().map_err(|_| TrajError::Parse {
        line,
        kind: TrajParseErrorKind::InvalidFloat {
            value: value.trim().to_string(),
        },
    })
}

/// The fixed columnar LAMMPS-style dump format used for every trajectory,
/// configuration and reference file in a campaign:
///
/// ```text
/// ITEM: TIMESTEP
/// ITEM: NUMBER OF ATOMS
/// ITEM: BOX BOUNDS pp pp pp
/// ITEM: ATOMS id type x y z vx vy vz
/// ```
pub struct LammpsDumpFile;

struct LineReader<'a, R: BufRead> {
    reader: &'a mut R,
    line: usize,
}

impl<'a, R: BufRead> LineReader<'a, R> {
    fn next_line(&mut self) -> Result<String, TrajError> {
        let mut buf = String::new();
        let read = self.reader.read_line(&mut buf)?;
        if read == 0 {
            return Err(TrajError::Parse {
                line: self.line,
                kind: TrajParseErrorKind::UnexpectedEof,
            });
        }
        self.line += 1;
        Ok(buf.trim_end().to_string())
    }
}

impl TrajectoryFile for LammpsDumpFile {
    type Metadata = DumpMetadata;
    type Error = TrajError;

    fn read_from(reader: &mut impl BufRead) -> Result<(Snapshot, Self::Metadata), Self::Error> {
        let mut lines = LineReader { reader, line: 0 };

        let header = lines.next_line()?;
        if !header.starts_with("ITEM: TIMESTEP") {
            return Err(TrajError::MissingSection("ITEM: TIMESTEP"));
        }
        let timestep = parse_u64(&lines.next_line()?, lines.line)?;

        let header = lines.next_line()?;
        if !header.starts_with("ITEM: NUMBER OF ATOMS") {
            return Err(TrajError::MissingSection("ITEM: NUMBER OF ATOMS"));
        }
        let count = parse_u64(&lines.next_line()?, lines.line)? as usize;

        let header = lines.next_line()?;
        if !header.starts_with("ITEM: BOX BOUNDS") {
            return Err(TrajError::MissingSection("ITEM: BOX BOUNDS"));
        }
        let mut lo = Vector3::zeros();
        let mut hi = Vector3::zeros();
        for axis in 0..3 {
            let bounds = lines.next_line()?;
            let mut fields = bounds.split_whitespace();
            let lo_str = fields.next().unwrap_or("");
            let hi_str = fields.next().unwrap_or("");
            lo[axis] = parse_f64(lo_str, lines.line)?;
            hi[axis] = parse_f64(hi_str, lines.line)?;
        }

        let header = lines.next_line()?;
        let columns = header.strip_prefix("ITEM: ATOMS ").map(str::trim);
        match columns {
            Some(found) if found == ATOM_COLUMNS => {}
            Some(found) => {
                return Err(TrajError::Parse {
                    line: lines.line,
                    kind: TrajParseErrorKind::UnsupportedColumns {
                        expected: ATOM_COLUMNS.to_string(),
                        found: found.to_string(),
                    },
                });
            }
            None => return Err(TrajError::MissingSection("ITEM: ATOMS")),
        }

        let mut positions = vec![Point3::origin(); count];
        let mut velocities = vec![Vector3::zeros(); count];
        let mut types = vec![0u32; count];
        let mut seen = vec![false; count];

        for _ in 0..count {
            let record = lines.next_line()?;
            let fields: Vec<&str> = record.split_whitespace().collect();
            if fields.len() < 8 {
                return Err(TrajError::Parse {
                    line: lines.line,
                    kind: TrajParseErrorKind::ShortAtomRecord {
                        expected: 8,
                        found: fields.len(),
                    },
                });
            }

            let id = parse_u64(fields[0], lines.line)? as usize;
            if id == 0 || id > count {
                return Err(TrajError::Inconsistency(format!(
                    "Atom id {} outside 1..={}",
                    id, count
                )));
            }
            let index = id - 1;
            if seen[index] {
                return Err(TrajError::Inconsistency(format!("Duplicate atom id {}", id)));
            }
            seen[index] = true;

            types[index] = parse_u64(fields[1], lines.line)? as u32;
            positions[index] = Point3::new(
                parse_f64(fields[2], lines.line)?,
                parse_f64(fields[3], lines.line)?,
                parse_f64(fields[4], lines.line)?,
            );
            velocities[index] = Vector3::new(
                parse_f64(fields[5], lines.line)?,
                parse_f64(fields[6], lines.line)?,
                parse_f64(fields[7], lines.line)?,
            );
        }

        let snapshot = Snapshot::new(positions, velocities, types, PeriodicCell::new(lo, hi))?;
        Ok((snapshot, DumpMetadata { timestep }))
    }

    fn write_to(
        snapshot: &Snapshot,
        metadata: &Self::Metadata,
        writer: &mut impl Write,
    ) -> Result<(), Self::Error> {
        writeln!(writer, "ITEM: TIMESTEP")?;
        writeln!(writer, "{}", metadata.timestep)?;
        writeln!(writer, "ITEM: NUMBER OF ATOMS")?;
        writeln!(writer, "{}", snapshot.len())?;
        writeln!(writer, "ITEM: BOX BOUNDS pp pp pp")?;
        let cell = snapshot.cell();
        for axis in 0..3 {
            writeln!(writer, "{:.9e} {:.9e}", cell.lo[axis], cell.hi[axis])?;
        }
        writeln!(writer, "ITEM: ATOMS {}", ATOM_COLUMNS)?;
        for (index, ((position, velocity), particle_type)) in snapshot
            .positions()
            .iter()
            .zip(snapshot.velocities())
            .zip(snapshot.types())
            .enumerate()
        {
            writeln!(
                writer,
                "{} {} {:.9} {:.9} {:.9} {:.9} {:.9} {:.9}",
                index + 1,
                particle_type,
                position.x,
                position.y,
                position.z,
                velocity.x,
                velocity.y,
                velocity.z,
            )?;
        }
        Ok(())
    }
}
