use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashMap;

lazy_static! {
    /* register code followed by one or more parenthesized values, e.g. 1-0:99.97.0(1)(0-0:96.7.19) */
    static ref DATA_LINE: Regex = Regex::new(r"^([^()\s]+)((?:\([^()]*\))+)$").unwrap();
    static ref VALUE: Regex = Regex::new(r"\(([^()]*)\)").unwrap();
}

#[derive(Debug, Clone, PartialEq)]
pub struct ObisData {
    pub code: String,
    pub values: Vec<String>,
    pub unit: Option<String>,
}

/// Split a telegram data line into its register code and values.
///
/// Returns `None` if the line is not of the form `CODE(value)(value)...` or
/// the code is not a valid OBIS code.
pub fn parse_obis_line(line: &str) -> Option<ObisData> {
    let caps = DATA_LINE.captures(line.trim())?;
    let code = normalize_obis_code(&caps[1]);
    if !validate_obis_code(&code) {
        return None;
    }

    let values: Vec<String> = VALUE
        .captures_iter(&caps[2])
        .map(|v| v[1].to_string())
        .collect();

    // The unit always belongs to the last value (e.g. the m3 reading after the gas timestamp)
    let unit = values.last().and_then(|v| extract_unit(v));

    Some(ObisData { code, values, unit })
}

pub fn get_obis_description(obis_code: &str) -> Option<&'static str> {
    let descriptions = get_dsmr_obis_descriptions();
    descriptions.get(obis_code).copied()
}

pub fn get_dsmr_obis_descriptions() -> HashMap<&'static str, &'static str> {
    let mut map = HashMap::new();

    // Header registers
    map.insert("1-3:0.2.8", "DSMR version");
    map.insert("0-0:1.0.0", "Date and time");
    map.insert("0-0:96.1.1", "Equipment identifier");
    map.insert("0-0:96.14.0", "Tariff indicator");

    // Energy values
    map.insert("1-0:1.8.1", "Active energy + (tariff 1)");
    map.insert("1-0:1.8.2", "Active energy + (tariff 2)");
    map.insert("1-0:2.8.1", "Active energy - (tariff 1)");
    map.insert("1-0:2.8.2", "Active energy - (tariff 2)");

    // Power values
    map.insert("1-0:1.7.0", "Active power + (total)");
    map.insert("1-0:2.7.0", "Active power - (total)");
    map.insert("1-0:21.7.0", "Active power + (L1)");
    map.insert("1-0:41.7.0", "Active power + (L2)");
    map.insert("1-0:61.7.0", "Active power + (L3)");
    map.insert("1-0:22.7.0", "Active power - (L1)");
    map.insert("1-0:42.7.0", "Active power - (L2)");
    map.insert("1-0:62.7.0", "Active power - (L3)");

    // Power quality
    map.insert("0-0:96.7.21", "Number of power failures");
    map.insert("0-0:96.7.9", "Number of long power failures");
    map.insert("1-0:99.97.0", "Power failure event log");
    map.insert("1-0:32.32.0", "Number of voltage sags (L1)");
    map.insert("1-0:52.32.0", "Number of voltage sags (L2)");
    map.insert("1-0:72.32.0", "Number of voltage sags (L3)");
    map.insert("1-0:32.36.0", "Number of voltage swells (L1)");
    map.insert("1-0:52.36.0", "Number of voltage swells (L2)");
    map.insert("1-0:72.36.0", "Number of voltage swells (L3)");
    map.insert("0-0:96.13.0", "Text message");

    // Voltage values
    map.insert("1-0:32.7.0", "Voltage (L1)");
    map.insert("1-0:52.7.0", "Voltage (L2)");
    map.insert("1-0:72.7.0", "Voltage (L3)");

    // Current values
    map.insert("1-0:31.7.0", "Current (L1)");
    map.insert("1-0:51.7.0", "Current (L2)");
    map.insert("1-0:71.7.0", "Current (L3)");

    // Gas meter on M-Bus channel 1
    map.insert("0-1:24.1.0", "M-Bus device type");
    map.insert("0-1:96.1.0", "M-Bus equipment identifier");
    map.insert("0-1:24.2.1", "Gas delivered");

    map
}

pub fn validate_obis_code(code: &str) -> bool {
    // OBIS code format: A-B:C.D.E*F
    // A: Medium (0=abstract, 1=electricity, 6=heat, 7=gas, 8=water)
    // B: Channel (0-15)
    // C: Physical value (1-255)
    // D: Processing method (0-255)
    // E: Tariff/Time (0-255)
    // F: Storage (optional, 0-255)

    let parts: Vec<&str> = code.split(':').collect();
    if parts.len() != 2 {
        return false;
    }

    let ab_parts: Vec<&str> = parts[0].split('-').collect();
    if ab_parts.len() != 2 {
        return false;
    }

    let cde_parts: Vec<&str> = parts[1].split('*').next().unwrap_or("").split('.').collect();
    if cde_parts.len() != 3 {
        return false;
    }

    for part in ab_parts.iter().chain(cde_parts.iter()) {
        if part.parse::<u8>().is_err() {
            return false;
        }
    }

    true
}

pub fn normalize_obis_code(code: &str) -> String {
    code.trim().to_string()
}

pub fn extract_unit(value_content: &str) -> Option<String> {
    if let Some(star_pos) = value_content.rfind('*') {
        let unit = &value_content[star_pos + 1..];
        if !unit.is_empty() {
            return Some(unit.to_string());
        }
    }
    None
}
