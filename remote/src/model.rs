use reqwest::StatusCode;
use serde::{de, Deserialize, Deserializer, Serialize};

/// Multipart field names accepted by `POST /upload`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum UploadField {
    Asm,
    Input,
    Answer,
    Source,
}

/// Request body of `POST /compile` and `POST /run`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Target {
    pub folder: String,
    pub name: String,
    pub name_without_suffix: String,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RunReport {
    Finished { time_ms: f64 },
    Failed { status: StatusCode, code: FailureCode },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureCode {
    LinkError,
    WrongAnswer,
    Other(i64),
    /// The failure body had no readable `code`.
    Unrecognized,
}

impl FailureCode {
    pub fn from_code(code: i64) -> Self {
        match code {
            1 => FailureCode::LinkError,
            2 => FailureCode::WrongAnswer,
            n => FailureCode::Other(n),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct RunSuccessBody {
    #[serde(deserialize_with = "number_or_numeric_string")]
    pub time: f64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RunFailureBody {
    pub code: i64,
}

fn number_or_numeric_string<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(f64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Number(x) => Ok(x),
        Raw::Text(s) => s.trim().parse().map_err(de::Error::custom),
    }
}
