//! Prompt construction and decoding of model answers.

use crate::generator::{AnalysisBatch, AnalysisRequest, GeneratedBatch, TickRequest};
use crate::{Result, ScanError};
use lazy_static::lazy_static;
use regex::Regex;
use serde::de::DeserializeOwned;

pub const SYSTEM_PROMPT: &str = "You are the narration engine of a security-scanner training \
simulator. You invent plausible but fictional scanner telemetry. You never contact real systems \
and you always answer with a single JSON object and nothing else.";

/// Source sent for analysis is cut to this many characters.
pub const MAX_SOURCE_CHARS: usize = 24_000;

const BATCH_SHAPE: &str = r#"{
  "logs": [{"level": "INFO|WARN|ERROR|SUCCESS|SYSTEM", "module": "CRAWLER|DAST|FORM_BOT|CORE", "message": "string"}],
  "vulnerabilities": [{"type": "string", "severity": "CRITICAL|HIGH|MEDIUM|LOW", "description": "string", "location": "/path", "payload": "string or null"}],
  "discovered_paths": ["/path"],
  "forms_detected": 0
}"#;

const ANALYSIS_SHAPE: &str = r#"{
  "findings": [{"type": "string", "severity": "CRITICAL|HIGH|MEDIUM|LOW", "description": "string", "location": "file:line", "payload": "offending snippet or null"}],
  "summary": "string"
}"#;

lazy_static! {
    static ref FENCED: Regex = Regex::new(r"(?s)```(?:json|JSON)?\s*(.*?)```").unwrap();
}

pub fn tick_prompt(request: &TickRequest) -> String {
    let known = if request.known_types.is_empty() {
        "none yet".to_string()
    } else {
        request.known_types.join(", ")
    };

    format!(
        "Simulated target: {target}\n\
         Cycle {tick} of {total}, current phase: {phase}. The {module} module is most active.\n\
         Produce 2 to 5 log lines for this cycle, any newly discovered paths, the number of new \
         forms found, and at most 2 new vulnerabilities. Do not repeat these already reported \
         vulnerability types: {known}.\n\
         Answer with JSON of exactly this shape:\n{shape}",
        target = request.target,
        tick = request.tick,
        total = request.total_ticks,
        phase = request.phase,
        module = request.phase.primary_module(),
        known = known,
        shape = BATCH_SHAPE,
    )
}

pub fn analysis_prompt(request: &AnalysisRequest) -> String {
    let source: String = request.source.chars().take(MAX_SOURCE_CHARS).collect();
    format!(
        "Review the following {language} file `{filename}` as a static analyzer would. Report \
         each distinct weakness class once.\n\
         Answer with JSON of exactly this shape:\n{shape}\n\n\
         --- BEGIN {filename} ---\n{source}\n--- END {filename} ---",
        language = request.language,
        filename = request.filename,
        shape = ANALYSIS_SHAPE,
        source = source,
    )
}

/// Locate the JSON object in raw model text: a fenced block wins, otherwise
/// the span from the first `{` to the last `}` of the whole answer.
pub fn extract_json(text: &str) -> Option<&str> {
    FENCED
        .captures(text)
        .and_then(|c| c.get(1))
        .and_then(|m| brace_span(m.as_str()))
        .or_else(|| brace_span(text))
}

fn brace_span(body: &str) -> Option<&str> {
    let start = body.find('{')?;
    let end = body.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&body[start..=end])
}

fn decode<T: DeserializeOwned>(text: &str) -> Result<T> {
    let json = extract_json(text)
        .ok_or_else(|| ScanError::Generator("model answer contained no JSON object".to_string()))?;
    serde_json::from_str(json)
        .map_err(|e| ScanError::Generator(format!("model answer was not valid batch JSON: {}", e)))
}

pub fn parse_batch(text: &str) -> Result<GeneratedBatch> {
    decode(text)
}

pub fn parse_analysis(text: &str) -> Result<AnalysisBatch> {
    decode(text)
}

/// Language label derived from a file extension
pub fn language_for(filename: &str) -> &'static str {
    let ext = filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "rs" => "Rust",
        "py" => "Python",
        "js" | "mjs" | "cjs" | "jsx" => "JavaScript",
        "ts" | "tsx" => "TypeScript",
        "php" => "PHP",
        "java" => "Java",
        "go" => "Go",
        "rb" => "Ruby",
        "cs" => "C#",
        "c" | "h" => "C",
        "cpp" | "cc" | "hpp" => "C++",
        "html" | "htm" => "HTML",
        "sql" => "SQL",
        _ => "plain text",
    }
}
