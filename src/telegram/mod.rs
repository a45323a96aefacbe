use crate::obis_utils;
use log::debug;
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Marker replaced by the zero-padded phase current on every render.
pub const PLACEHOLDER: &str = "{current}";

/// Number of substitution sites every template has to carry (one per phase).
pub const PLACEHOLDER_COUNT: usize = 3;

/// Line terminator of the P1 port.
pub const LINE_END: &[u8] = b"\r\n";

/// ESMR 5.0 telegram of a three phase meter with a gas meter on M-Bus channel 1.
/// The trailing checksum is a fixed value, consumers under test are not
/// expected to verify it.
pub const DEFAULT_TELEGRAM: &str = r"
/Ene5\T210-D ESMR5.0

1-3:0.2.8(50)
0-0:1.0.0(180108202537W)
0-0:96.1.1(serienummer)
1-0:1.8.1(000112.286*kWh)
1-0:1.8.2(000000.000*kWh)
1-0:2.8.1(000000.084*kWh)
1-0:2.8.2(000000.000*kWh)
0-0:96.14.0(0002)
1-0:1.7.0(00.134*kW)
1-0:2.7.0(00.000*kW)
0-0:96.7.21(00008)
0-0:96.7.9(00004)
1-0:99.97.0(1)(0-0:96.7.19)(171024204625S)(0000000305*s)
1-0:32.32.0(00003)
1-0:52.32.0(00003)
1-0:72.32.0(00002)
1-0:32.36.0(00000)
1-0:52.36.0(00000)
1-0:72.36.0(00000)
0-0:96.13.0()
1-0:32.7.0(229.1*V)
1-0:52.7.0(229.1*V)
1-0:72.7.0(229.1*V)
1-0:31.7.0({current}*A)
1-0:51.7.0({current}*A)
1-0:71.7.0({current}*A)
1-0:21.7.0(01.150*kW)
1-0:41.7.0(01.150*kW)
1-0:61.7.0(01.150*kW)
1-0:22.7.0(00.000*kW)
1-0:42.7.0(00.000*kW)
1-0:62.7.0(00.000*kW)
0-1:24.1.0(003)
0-1:96.1.0(serienummer)
0-1:24.2.1(180108205500W)(00001.290*m3)
!B055
";

#[derive(Error, Debug)]
pub enum TemplateError {
    #[error("Unable to read template {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Template must contain exactly 3 {{current}} placeholders, found {0}")]
    PlaceholderCount(usize),
    #[error("Template has no identification line starting with '/'")]
    MissingHeader,
    #[error("Template has no trailer line starting with '!'")]
    MissingTrailer,
    #[error("Invalid data line {line}: '{content}'")]
    InvalidDataLine { line: usize, content: String },
    #[error("Control character in template line {line}")]
    ControlCharacter { line: usize },
}

/// A telegram line holds a character the P1 port cannot carry.
#[derive(Error, Debug, PartialEq)]
#[error("Line {line} contains non ASCII character {character:?}")]
pub struct EncodingError {
    pub line: usize,
    pub character: char,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    lines: Vec<String>,
}

impl Default for Template {
    fn default() -> Self {
        /* DEFAULT_TELEGRAM is a valid template */
        return Template::parse(DEFAULT_TELEGRAM).unwrap();
    }
}

impl Template {
    pub fn from_file(path: &Path) -> Result<Self, TemplateError> {
        let text = fs::read_to_string(path).map_err(|e| TemplateError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        return Template::parse(&text);
    }

    /// Validate a telegram template and keep its stripped lines.
    ///
    /// Blank lines before the identification line and after the trailer are
    /// dropped, blank lines in between are part of the telegram.
    pub fn parse(text: &str) -> Result<Self, TemplateError> {
        let found = text.matches(PLACEHOLDER).count();
        if found != PLACEHOLDER_COUNT {
            return Err(TemplateError::PlaceholderCount(found));
        }

        let lines: Vec<String> = text
            .lines()
            .map(|l| l.trim().to_string())
            .skip_while(|l| l.is_empty())
            .collect();
        let end = lines.iter().rposition(|l| !l.is_empty()).unwrap_or(0);
        let lines: Vec<String> = lines.into_iter().take(end + 1).collect();

        match lines.first() {
            Some(l) if l.starts_with('/') => {}
            _ => return Err(TemplateError::MissingHeader),
        }
        if lines.len() < 2 || !lines[lines.len() - 1].starts_with('!') {
            return Err(TemplateError::MissingTrailer);
        }

        for (idx, line) in lines.iter().enumerate() {
            if line.chars().any(|c| c.is_ascii_control()) {
                return Err(TemplateError::ControlCharacter { line: idx + 1 });
            }
        }

        /* Everything between identification and trailer has to be a register */
        for (idx, line) in lines.iter().enumerate().take(lines.len() - 1).skip(1) {
            if line.is_empty() {
                continue;
            }
            let probe = line.replace(PLACEHOLDER, "000");
            match obis_utils::parse_obis_line(&probe) {
                Some(data) => {
                    debug!(
                        "Template register {} ({}) = {:?} unit {}",
                        data.code,
                        obis_utils::get_obis_description(&data.code).unwrap_or("unknown"),
                        data.values,
                        data.unit.as_deref().unwrap_or("-")
                    );
                }
                None => {
                    return Err(TemplateError::InvalidDataLine {
                        line: idx + 1,
                        content: line.clone(),
                    });
                }
            }
        }

        return Ok(Template { lines });
    }

    /// Render the telegram text for one phase current, lines separated by '\n'.
    pub fn render(&self, current: u32) -> String {
        let value = format!("{:03}", current);
        return self
            .lines
            .iter()
            .map(|l| l.replace(PLACEHOLDER, &value))
            .collect::<Vec<String>>()
            .join("\n");
    }

    /// Number of non blank lines in every rendered telegram.
    pub fn data_line_count(&self) -> usize {
        return self.lines.iter().filter(|l| !l.is_empty()).count();
    }

    pub fn header(&self) -> &str {
        return &self.lines[0];
    }

    pub fn trailer(&self) -> &str {
        return &self.lines[self.lines.len() - 1];
    }
}

/// Strip a rendered line and frame it for the wire: ASCII bytes plus CR LF.
pub fn encode_line(line: &str, line_no: usize) -> Result<Vec<u8>, EncodingError> {
    let line = line.trim();
    if let Some(character) = line.chars().find(|c| !c.is_ascii()) {
        return Err(EncodingError { line: line_no, character });
    }

    let mut out = Vec::with_capacity(line.len() + LINE_END.len());
    out.extend_from_slice(line.as_bytes());
    out.extend_from_slice(LINE_END);
    Ok(out)
}

/// Frame a whole telegram, fails before returning anything if one line cannot be encoded.
pub fn encode_telegram(rendered: &str) -> Result<Vec<Vec<u8>>, EncodingError> {
    rendered
        .lines()
        .enumerate()
        .map(|(idx, line)| encode_line(line, idx + 1))
        .collect()
}
