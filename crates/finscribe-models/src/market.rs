use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Daily bar as stored in the trends tool's data directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub date: NaiveDate,
    pub close: f64,
    pub volume: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserialize_bar_array() {
        let json = r#"[
            {"date": "2026-01-02", "close": 185.2, "volume": 51000000},
            {"date": "2026-01-05", "close": 187.9, "volume": 48000000}
        ]"#;
        let bars: Vec<Bar> = serde_json::from_str(json).unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[1].close, 187.9);
        assert_eq!(bars[0].date, NaiveDate::from_ymd_opt(2026, 1, 2).unwrap());
    }
}
