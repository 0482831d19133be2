//! Generative backend boundary.
//!
//! Every log line and finding the dashboard shows comes through a
//! [`FindingGenerator`]. The HTTP backends forward a prompt to a hosted or
//! local model and decode its JSON answer; [`OfflineGenerator`] fabricates
//! the same shapes from built-in catalogues without touching the network.

use crate::config::{Config, ProviderKind};
use crate::prompt;
use crate::types::{LogEntry, LogLevel, ModuleTag, ScanPhase, Severity, Vulnerability};
use crate::{Result, ScanError};
use async_trait::async_trait;
use fastrand::Rng;
use lazy_static::lazy_static;
use log::{debug, info};
use parking_lot::Mutex;
use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Deserializer, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Model output uses `null` freely; treat it like an absent field.
fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Context sent with every tick
#[derive(Debug, Clone, Serialize)]
pub struct TickRequest {
    pub target: String,
    pub tick: u32,
    pub total_ticks: u32,
    pub phase: ScanPhase,
    /// Finding types already reported this session
    pub known_types: Vec<String>,
}

/// Source file handed to the static-analysis call
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisRequest {
    pub filename: String,
    pub language: String,
    pub source: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RawLog {
    #[serde(default, deserialize_with = "null_as_default")]
    pub level: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub module: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub message: String,
}

impl RawLog {
    pub fn new(level: LogLevel, module: ModuleTag, message: impl Into<String>) -> Self {
        Self {
            level: level.as_str().to_string(),
            module: module.as_str().to_string(),
            message: message.into(),
        }
    }

    /// Records without a message are dropped.
    pub fn into_entry(self) -> Option<LogEntry> {
        let message = self.message.trim();
        if message.is_empty() {
            return None;
        }
        Some(LogEntry::new(
            LogLevel::parse_lenient(&self.level),
            ModuleTag::parse_lenient(&self.module),
            message,
        ))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RawFinding {
    #[serde(default, rename = "type", alias = "kind", alias = "name", deserialize_with = "null_as_default")]
    pub kind: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub severity: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub location: String,
    #[serde(default)]
    pub payload: Option<String>,
}

impl RawFinding {
    /// Records without a type are dropped.
    pub fn into_vulnerability(self) -> Option<Vulnerability> {
        let kind = self.kind.trim();
        if kind.is_empty() {
            return None;
        }
        Some(Vulnerability {
            id: uuid::Uuid::new_v4().to_string(),
            kind: kind.to_string(),
            severity: Severity::parse_lenient(&self.severity),
            description: self.description.trim().to_string(),
            location: self.location.trim().to_string(),
            payload: self
                .payload
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty()),
        })
    }
}

/// Fabricated records for one tick
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct GeneratedBatch {
    #[serde(default, deserialize_with = "null_as_default")]
    pub logs: Vec<RawLog>,
    #[serde(default, alias = "findings", deserialize_with = "null_as_default")]
    pub vulnerabilities: Vec<RawFinding>,
    #[serde(default, alias = "paths", deserialize_with = "null_as_default")]
    pub discovered_paths: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub forms_detected: u64,
}

/// Fabricated static-analysis answer
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AnalysisBatch {
    #[serde(default, alias = "vulnerabilities", deserialize_with = "null_as_default")]
    pub findings: Vec<RawFinding>,
    #[serde(default)]
    pub summary: Option<String>,
}

#[async_trait]
pub trait FindingGenerator: Send + Sync {
    /// Produce the batch for one scan tick.
    async fn generate(&self, request: &TickRequest) -> Result<GeneratedBatch>;

    /// Produce static-analysis findings for a source file.
    async fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisBatch>;

    /// Backend name for display
    fn name(&self) -> &str;
}

/// Build the backend selected by the configuration.
pub fn from_config(config: &Config) -> Result<Arc<dyn FindingGenerator>> {
    let generator: Arc<dyn FindingGenerator> = match config.generator.provider {
        ProviderKind::Gemini => Arc::new(GeminiGenerator::new(config)?),
        ProviderKind::Ollama => Arc::new(OllamaGenerator::new(config)?),
        ProviderKind::Offline => Arc::new(match config.generator.seed {
            Some(seed) => OfflineGenerator::with_seed(seed),
            None => OfflineGenerator::new(),
        }),
    };
    info!("Using {} generator", generator.name());
    Ok(generator)
}

fn build_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| ScanError::Generator(format!("Failed to create HTTP client: {}", e)))
}

async fn read_json(response: reqwest::Response, backend: &str) -> Result<serde_json::Value> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ScanError::Generator(format!("{} API error ({}): {}", backend, status, body)));
    }
    Ok(response.json().await?)
}

// ---------------------------------------------------------------------------
// Gemini
// ---------------------------------------------------------------------------

pub struct GeminiGenerator {
    client: Client,
    endpoint: String,
    api_key: String,
    model: String,
    temperature: f32,
}

impl GeminiGenerator {
    pub fn new(config: &Config) -> Result<Self> {
        let api_key = config
            .generator
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| ScanError::InvalidInput("Gemini provider requires an API key".to_string()))?;

        Ok(Self {
            client: build_client(config.generator_timeout())?,
            endpoint: config.generator_endpoint(),
            api_key,
            model: config.generator.model.clone(),
            temperature: config.generator.temperature,
        })
    }

    async fn complete(&self, system: &str, prompt: &str) -> Result<String> {
        let url = format!("{}/v1beta/models/{}:generateContent", self.endpoint, self.model);
        let body = serde_json::json!({
            "systemInstruction": { "parts": [{ "text": system }] },
            "contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
            "generationConfig": {
                "temperature": self.temperature,
                "responseMimeType": "application/json",
            },
        });

        debug!("POST {}", url);
        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        let payload = read_json(response, "Gemini").await?;
        let text: String = payload["candidates"][0]["content"]["parts"]
            .as_array()
            .map(|parts| {
                parts
                    .iter()
                    .filter_map(|p| p["text"].as_str())
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(ScanError::Generator("Gemini returned no text candidate".to_string()));
        }
        Ok(text)
    }
}

#[async_trait]
impl FindingGenerator for GeminiGenerator {
    async fn generate(&self, request: &TickRequest) -> Result<GeneratedBatch> {
        let text = self.complete(prompt::SYSTEM_PROMPT, &prompt::tick_prompt(request)).await?;
        prompt::parse_batch(&text)
    }

    async fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisBatch> {
        let text = self.complete(prompt::SYSTEM_PROMPT, &prompt::analysis_prompt(request)).await?;
        prompt::parse_analysis(&text)
    }

    fn name(&self) -> &str {
        "gemini"
    }
}

// ---------------------------------------------------------------------------
// Ollama (local models)
// ---------------------------------------------------------------------------

pub struct OllamaGenerator {
    client: Client,
    endpoint: String,
    model: String,
    temperature: f32,
}

impl OllamaGenerator {
    pub fn new(config: &Config) -> Result<Self> {
        Ok(Self {
            client: build_client(config.generator_timeout())?,
            endpoint: config.generator_endpoint(),
            model: config.generator.model.clone(),
            temperature: config.generator.temperature,
        })
    }

    async fn complete(&self, system: &str, prompt: &str) -> Result<String> {
        let url = format!("{}/api/chat", self.endpoint);
        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": prompt },
            ],
            "stream": false,
            "format": "json",
            "options": { "temperature": self.temperature },
        });

        debug!("POST {}", url);
        let response = self.client.post(&url).json(&body).send().await?;
        let payload = read_json(response, "Ollama").await?;

        payload["message"]["content"]
            .as_str()
            .map(|s| s.to_string())
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| ScanError::Generator("Ollama response had no message content".to_string()))
    }
}

#[async_trait]
impl FindingGenerator for OllamaGenerator {
    async fn generate(&self, request: &TickRequest) -> Result<GeneratedBatch> {
        let text = self.complete(prompt::SYSTEM_PROMPT, &prompt::tick_prompt(request)).await?;
        prompt::parse_batch(&text)
    }

    async fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisBatch> {
        let text = self.complete(prompt::SYSTEM_PROMPT, &prompt::analysis_prompt(request)).await?;
        prompt::parse_analysis(&text)
    }

    fn name(&self) -> &str {
        "ollama"
    }
}

// ---------------------------------------------------------------------------
// Offline fabrication
// ---------------------------------------------------------------------------

const PATH_CATALOG: &[&str] = &[
    "/", "/login", "/register", "/search", "/contact", "/about", "/cart", "/checkout",
    "/account/settings", "/account/profile", "/admin", "/admin/users", "/api/v1/users",
    "/api/v1/orders", "/api/v1/auth/token", "/uploads", "/static/js/app.js",
    "/products", "/products/view", "/reset-password", "/feedback", "/graphql",
];

struct CatalogFinding {
    kind: &'static str,
    severity: Severity,
    description: &'static str,
    location: &'static str,
    payload: Option<&'static str>,
}

const FINDING_CATALOG: &[CatalogFinding] = &[
    CatalogFinding {
        kind: "SQL Injection",
        severity: Severity::Critical,
        description: "Error-based SQL injection in the username parameter",
        location: "/login",
        payload: Some("admin' OR '1'='1' -- "),
    },
    CatalogFinding {
        kind: "Reflected XSS",
        severity: Severity::High,
        description: "Search term is reflected into the page without encoding",
        location: "/search",
        payload: Some("<script>alert(document.domain)</script>"),
    },
    CatalogFinding {
        kind: "Stored XSS",
        severity: Severity::High,
        description: "Feedback messages are rendered as raw HTML to administrators",
        location: "/feedback",
        payload: Some("<img src=x onerror=alert(1)>"),
    },
    CatalogFinding {
        kind: "Missing CSRF Token",
        severity: Severity::Medium,
        description: "State-changing form accepts submissions without an anti-CSRF token",
        location: "/account/settings",
        payload: None,
    },
    CatalogFinding {
        kind: "Insecure Direct Object Reference",
        severity: Severity::High,
        description: "Order records are retrievable by incrementing the numeric identifier",
        location: "/api/v1/orders",
        payload: Some("GET /api/v1/orders/1002"),
    },
    CatalogFinding {
        kind: "Open Redirect",
        severity: Severity::Medium,
        description: "The next parameter accepts arbitrary external URLs",
        location: "/login",
        payload: Some("?next=https://evil.example"),
    },
    CatalogFinding {
        kind: "Missing Security Headers",
        severity: Severity::Low,
        description: "Content-Security-Policy and X-Frame-Options are not set",
        location: "/",
        payload: None,
    },
    CatalogFinding {
        kind: "Verbose Error Messages",
        severity: Severity::Low,
        description: "Stack traces are returned for malformed requests",
        location: "/api/v1/users",
        payload: Some("{\"id\": \"'\"}"),
    },
    CatalogFinding {
        kind: "Unrestricted File Upload",
        severity: Severity::Critical,
        description: "Executable extensions are accepted by the upload handler",
        location: "/uploads",
        payload: Some("shell.php.jpg"),
    },
    CatalogFinding {
        kind: "GraphQL Introspection Enabled",
        severity: Severity::Low,
        description: "Schema introspection is available to unauthenticated clients",
        location: "/graphql",
        payload: Some("{ __schema { types { name } } }"),
    },
];

fn phase_phrases(phase: ScanPhase) -> &'static [(LogLevel, ModuleTag, &'static str)] {
    match phase {
        ScanPhase::Recon => &[
            (LogLevel::System, ModuleTag::Core, "Resolving {target} and fingerprinting the stack"),
            (LogLevel::Info, ModuleTag::Core, "Detected reverse proxy in front of {target}"),
            (LogLevel::Info, ModuleTag::Crawler, "Fetched robots.txt and sitemap.xml"),
            (LogLevel::Success, ModuleTag::Core, "TLS handshake profile recorded"),
        ],
        ScanPhase::Crawl => &[
            (LogLevel::Info, ModuleTag::Crawler, "Following links from {path}"),
            (LogLevel::Info, ModuleTag::Crawler, "Queued {path} for analysis"),
            (LogLevel::Warn, ModuleTag::Crawler, "Rate limit hint received while crawling {path}"),
            (LogLevel::Success, ModuleTag::Crawler, "Indexed {path}"),
        ],
        ScanPhase::FormAnalysis => &[
            (LogLevel::Info, ModuleTag::FormBot, "Enumerating input fields on {path}"),
            (LogLevel::Info, ModuleTag::FormBot, "Submitting benign probe values to {path}"),
            (LogLevel::Warn, ModuleTag::FormBot, "Form on {path} lacks client-side validation"),
            (LogLevel::Success, ModuleTag::FormBot, "Mapped parameters for {path}"),
        ],
        ScanPhase::Injection => &[
            (LogLevel::Info, ModuleTag::Dast, "Injecting payload set into {path}"),
            (LogLevel::Warn, ModuleTag::Dast, "Anomalous response length from {path}"),
            (LogLevel::Error, ModuleTag::Dast, "Request to {path} timed out, continuing"),
            (LogLevel::Info, ModuleTag::Dast, "Mutating parameters discovered on {path}"),
        ],
        ScanPhase::Report => &[
            (LogLevel::System, ModuleTag::Core, "Correlating findings for {target}"),
            (LogLevel::Info, ModuleTag::Core, "Scoring findings by severity"),
            (LogLevel::Success, ModuleTag::Core, "Report data assembled"),
        ],
    }
}

lazy_static! {
    static ref SOURCE_RULES: Vec<(Regex, &'static str, Severity, &'static str)> = vec![
        (
            Regex::new(r#"(?i)\b(select|insert|update|delete)\b[^;]*["'`]\s*(\+|\.\s|%)"#).unwrap(),
            "SQL Injection",
            Severity::Critical,
            "Query text is built by concatenating untrusted input",
        ),
        (
            Regex::new(r"\beval\s*\(").unwrap(),
            "Code Injection",
            Severity::High,
            "Dynamic evaluation of a runtime string",
        ),
        (
            Regex::new(r"\.innerHTML\s*=|dangerouslySetInnerHTML").unwrap(),
            "DOM-based XSS",
            Severity::High,
            "Markup assigned from a variable without sanitisation",
        ),
        (
            Regex::new(r#"(?i)(api[_-]?key|secret|passw(or)?d|token)\s*[:=]\s*["'][^"']{6,}["']"#).unwrap(),
            "Hardcoded Credential",
            Severity::High,
            "Secret literal committed in source",
        ),
        (
            Regex::new(r"(?i)\b(md5|sha1)\s*\(").unwrap(),
            "Weak Hash Algorithm",
            Severity::Low,
            "Broken hash function used for integrity or password storage",
        ),
        (
            Regex::new(r#"["']http://[^"']+["']"#).unwrap(),
            "Cleartext Transport",
            Severity::Low,
            "Hard-coded plain HTTP endpoint",
        ),
    ];
}

/// Network-free generator with deterministic output for a given seed
pub struct OfflineGenerator {
    rng: Mutex<Rng>,
}

impl OfflineGenerator {
    pub fn new() -> Self {
        Self { rng: Mutex::new(Rng::new()) }
    }

    pub fn with_seed(seed: u64) -> Self {
        Self { rng: Mutex::new(Rng::with_seed(seed)) }
    }

    fn fabricate(&self, request: &TickRequest) -> GeneratedBatch {
        let mut rng = self.rng.lock();
        let host = url::Url::parse(&request.target)
            .ok()
            .and_then(|u| u.host_str().map(|h| h.to_string()))
            .unwrap_or_else(|| request.target.clone());

        let (path_range, forms_range, finding_chance) = match request.phase {
            ScanPhase::Recon => (1..=2, 0..=0, 0),
            ScanPhase::Crawl => (2..=4, 0..=1, 10),
            ScanPhase::FormAnalysis => (1..=2, 1..=3, 35),
            ScanPhase::Injection => (0..=1, 0..=0, 70),
            ScanPhase::Report => (0..=0, 0..=0, 0),
        };

        let paths: Vec<String> = (0..rng.usize(path_range))
            .map(|_| PATH_CATALOG[rng.usize(..PATH_CATALOG.len())].to_string())
            .collect();

        let phrases = phase_phrases(request.phase);
        let logs = (0..rng.usize(2..=4))
            .map(|_| {
                let (level, module, template) = phrases[rng.usize(..phrases.len())];
                let path = paths
                    .first()
                    .map(|p| p.as_str())
                    .unwrap_or_else(|| PATH_CATALOG[rng.usize(..PATH_CATALOG.len())]);
                RawLog::new(level, module, template.replace("{target}", &host).replace("{path}", path))
            })
            .collect();

        let mut vulnerabilities = Vec::new();
        if rng.u8(0..100) < finding_chance {
            let fresh: Vec<&CatalogFinding> = FINDING_CATALOG
                .iter()
                .filter(|f| {
                    !request
                        .known_types
                        .iter()
                        .any(|k| Vulnerability::type_key(k) == Vulnerability::type_key(f.kind))
                })
                .collect();
            if !fresh.is_empty() {
                let pick = fresh[rng.usize(..fresh.len())];
                vulnerabilities.push(RawFinding {
                    kind: pick.kind.to_string(),
                    severity: pick.severity.as_str().to_string(),
                    description: pick.description.to_string(),
                    location: pick.location.to_string(),
                    payload: pick.payload.map(|p| p.to_string()),
                });
            }
        }

        GeneratedBatch {
            logs,
            vulnerabilities,
            discovered_paths: paths,
            forms_detected: rng.u64(forms_range),
        }
    }
}

impl Default for OfflineGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FindingGenerator for OfflineGenerator {
    async fn generate(&self, request: &TickRequest) -> Result<GeneratedBatch> {
        Ok(self.fabricate(request))
    }

    async fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisBatch> {
        let mut findings = Vec::new();
        for (line_no, line) in request.source.lines().enumerate() {
            for (pattern, kind, severity, description) in SOURCE_RULES.iter() {
                if let Some(m) = pattern.find(line) {
                    findings.push(RawFinding {
                        kind: kind.to_string(),
                        severity: severity.as_str().to_string(),
                        description: description.to_string(),
                        location: format!("{}:{}", request.filename, line_no + 1),
                        payload: Some(m.as_str().trim().to_string()),
                    });
                }
            }
        }

        let summary = format!(
            "Reviewed {} lines of {} and flagged {} pattern matches",
            request.source.lines().count(),
            request.language,
            findings.len()
        );
        Ok(AnalysisBatch { findings, summary: Some(summary) })
    }

    fn name(&self) -> &str {
        "offline"
    }
}
