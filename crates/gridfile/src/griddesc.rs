//! I/O-API GRIDDESC reader.
//!
//! The file has two sections, each closed by a `' '` line: coordinate
//! systems (name line, then `GDTYP P_ALP P_BET P_GAM XCENT YCENT`) and grids
//! (name line, then `COORD XORIG YORIG XCELL YCELL NCOLS NROWS NTHIK`).

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::GridFileError;

/// Map projection of a GRIDDESC coordinate system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoordSystem {
    pub name: String,
    pub gdtyp: i32,
    pub p_alp: f64,
    pub p_bet: f64,
    pub p_gam: f64,
    pub xcent: f64,
    pub ycent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridEntry {
    pub name: String,
    pub coord_name: String,
    pub xorig: f64,
    pub yorig: f64,
    pub xcell: f64,
    pub ycell: f64,
    pub ncols: usize,
    pub nrows: usize,
    pub nthik: i32,
}

/// A grid resolved against its coordinate system, plus the vertical
/// description the I/O-API header also carries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridDescription {
    pub coord: CoordSystem,
    pub grid: GridEntry,
    pub vgtyp: i32,
    pub vgtop: f64,
    pub vglvls: Vec<f64>,
}

impl GridDescription {
    /// Overrides the vertical description (defaults: `-9999`, `0`, `[0, 0]`).
    pub fn with_vertical(mut self, vgtyp: i32, vgtop: f64, vglvls: Vec<f64>) -> Self {
        self.vgtyp = vgtyp;
        self.vgtop = vgtop;
        self.vglvls = vglvls;
        self
    }
}

/// Every coordinate system and grid of a GRIDDESC file.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GridDesc {
    pub coords: Vec<CoordSystem>,
    pub grids: Vec<GridEntry>,
}

impl GridDesc {
    pub fn parse(text: &str) -> Result<Self, GridFileError> {
        let mut lines = text
            .lines()
            .enumerate()
            .map(|(i, l)| (i + 1, tokenize(l)))
            .filter(|(_, t)| !t.is_empty());

        let mut desc = GridDesc::default();
        expect_separator(lines.next())?;
        loop {
            let (line, name) = next_name(&mut lines)?;
            let Some(name) = name else { break };
            let (line, fields) = lines.next().ok_or_else(|| eof(line))?;
            let f = Fields::new(&fields, line, 6)?;
            desc.coords.push(CoordSystem {
                name,
                gdtyp: f.int(0)?,
                p_alp: f.float(1)?,
                p_bet: f.float(2)?,
                p_gam: f.float(3)?,
                xcent: f.float(4)?,
                ycent: f.float(5)?,
            });
        }
        loop {
            let (line, name) = next_name(&mut lines)?;
            let Some(name) = name else { break };
            let (line, fields) = lines.next().ok_or_else(|| eof(line))?;
            let f = Fields::new(&fields, line, 8)?;
            desc.grids.push(GridEntry {
                name,
                coord_name: unquote(&fields[0]).to_string(),
                xorig: f.float(1)?,
                yorig: f.float(2)?,
                xcell: f.float(3)?,
                ycell: f.float(4)?,
                ncols: f.count(5)?,
                nrows: f.count(6)?,
                nthik: f.int(7)?,
            });
        }
        Ok(desc)
    }

    pub fn read(path: &Path) -> Result<Self, GridFileError> {
        Self::parse(&std::fs::read_to_string(path)?)
    }

    /// Resolves grid `name` against its coordinate system.
    pub fn grid(&self, name: &str) -> Result<GridDescription, GridFileError> {
        let grid = self
            .grids
            .iter()
            .find(|g| g.name == name)
            .ok_or_else(|| GridFileError::GridDesc(format!("no grid named {name}")))?;
        let coord = self
            .coords
            .iter()
            .find(|c| c.name == grid.coord_name)
            .ok_or_else(|| {
                GridFileError::GridDesc(format!(
                    "grid {name} uses unknown coordinate system {}",
                    grid.coord_name
                ))
            })?;
        Ok(GridDescription {
            coord: coord.clone(),
            grid: grid.clone(),
            vgtyp: -9999,
            vgtop: 0.0,
            vglvls: vec![0.0, 0.0],
        })
    }
}

/// Splits on whitespace and commas; single quotes group a name.
fn tokenize(line: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut chars = line.trim().chars().peekable();
    while let Some(&c) = chars.peek() {
        if c.is_whitespace() || c == ',' {
            chars.next();
        } else if c == '\'' {
            chars.next();
            let quoted: String = chars.by_ref().take_while(|&c| c != '\'').collect();
            out.push(format!("'{}'", quoted.trim()));
        } else if c == '!' {
            break;
        } else {
            let mut tok = String::new();
            while let Some(&c) = chars.peek() {
                if c.is_whitespace() || c == ',' {
                    break;
                }
                tok.push(c);
                chars.next();
            }
            out.push(tok);
        }
    }
    out
}

fn unquote(tok: &str) -> &str {
    tok.trim_start_matches('\'').trim_end_matches('\'')
}

fn eof(line: usize) -> GridFileError {
    GridFileError::GridDesc(format!("unexpected end of file after line {line}"))
}

fn expect_separator(next: Option<(usize, Vec<String>)>) -> Result<(), GridFileError> {
    match next {
        Some((_, t)) if t.len() == 1 && t[0] == "''" => Ok(()),
        Some((line, t)) => Err(GridFileError::GridDesc(format!(
            "line {line}: expected ' ' separator, found {t:?}"
        ))),
        None => Err(GridFileError::GridDesc("empty GRIDDESC".to_string())),
    }
}

/// Next section entry name, or `None` at the `' '` closing the section.
fn next_name(
    lines: &mut impl Iterator<Item = (usize, Vec<String>)>,
) -> Result<(usize, Option<String>), GridFileError> {
    let (line, t) = lines
        .next()
        .ok_or_else(|| GridFileError::GridDesc("section not closed by ' '".to_string()))?;
    if t[0] == "''" {
        return Ok((line, None));
    }
    Ok((line, Some(unquote(&t[0]).to_string())))
}

struct Fields<'a> {
    tokens: &'a [String],
    line: usize,
}

impl<'a> Fields<'a> {
    fn new(tokens: &'a [String], line: usize, want: usize) -> Result<Self, GridFileError> {
        if tokens.len() < want {
            return Err(GridFileError::GridDesc(format!(
                "line {line}: expected {want} fields, found {}",
                tokens.len()
            )));
        }
        Ok(Self { tokens, line })
    }

    fn bad(&self, i: usize, what: &str) -> GridFileError {
        GridFileError::GridDesc(format!(
            "line {}: field {} '{}' is not {what}",
            self.line,
            i + 1,
            self.tokens[i]
        ))
    }

    fn float(&self, i: usize) -> Result<f64, GridFileError> {
        // Fortran-style exponents ("1.0D+03") appear in hand-edited files.
        self.tokens[i]
            .replace(['D', 'd'], "E")
            .parse()
            .map_err(|_| self.bad(i, "a number"))
    }

    fn int(&self, i: usize) -> Result<i32, GridFileError> {
        self.tokens[i].parse().map_err(|_| self.bad(i, "an integer"))
    }

    fn count(&self, i: usize) -> Result<usize, GridFileError> {
        self.tokens[i].parse().map_err(|_| self.bad(i, "a cell count"))
    }
}
