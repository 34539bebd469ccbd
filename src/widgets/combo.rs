//! Option lists for combo widgets: static lists and remote data sources.

use crate::error::FlowError;
use crate::types::{DataSource, NodeId};
#[cfg(not(target_arch = "wasm32"))]
use crate::types::HttpMethod;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::mpsc::Receiver;

/// Pulls the option list out of a data source response.
///
/// `transform` names a key whose value holds the list; `value_field` projects a
/// field out of object items. Scalars are stringified.
pub fn extract_options(response: &Value, transform: Option<&str>, value_field: Option<&str>) -> Result<Vec<String>, FlowError> {
    let list = match transform {
        Some(key) => response.get(key).ok_or_else(|| FlowError::Protocol(format!("response has no '{key}' field")))?,
        None => response,
    };
    let items = list
        .as_array()
        .ok_or_else(|| FlowError::Protocol("option list is not an array".to_string()))?;
    Ok(items
        .iter()
        .filter_map(|item| {
            let value = match (value_field, item) {
                (Some(field), Value::Object(map)) => map.get(field)?,
                _ => item,
            };
            match value {
                Value::String(s) => Some(s.clone()),
                Value::Null => None,
                other => Some(other.to_string()),
            }
        })
        .collect())
}

/// Case-insensitive substring filter. Returns at most `cap` matches plus the total
/// number of matches.
pub fn filter_options<'a>(options: &'a [String], query: &str, cap: usize) -> (Vec<&'a String>, usize) {
    let needle = query.trim().to_lowercase();
    let matches: Vec<&String> = options
        .iter()
        .filter(|o| needle.is_empty() || o.to_lowercase().contains(&needle))
        .collect();
    let total = matches.len();
    (matches.into_iter().take(cap).collect(), total)
}

/// Fetches and extracts the options of a data source.
#[cfg(not(target_arch = "wasm32"))]
pub fn fetch_options(source: &DataSource) -> Result<Vec<String>, FlowError> {
    let to_error = |e: reqwest::Error| FlowError::DataSource {
        endpoint: source.endpoint.clone(),
        message: e.to_string(),
    };
    let client = reqwest::blocking::Client::builder()
        .timeout(std::time::Duration::from_secs(10))
        .build()
        .map_err(to_error)?;
    let mut request = match source.method {
        HttpMethod::Get => client.get(&source.endpoint),
        HttpMethod::Post => client.post(&source.endpoint),
    };
    for (name, value) in &source.headers {
        request = request.header(name.as_str(), value.as_str());
    }
    let response = request.send().map_err(to_error)?.error_for_status().map_err(to_error)?;
    let body: Value = response.json().map_err(to_error)?;
    extract_options(&body, source.transform.as_deref(), source.value_field.as_deref())
}

/// Load state of a remote option list.
#[derive(Debug, Clone, PartialEq)]
pub enum OptionsState {
    /// Request in flight
    Loading,
    /// Options from the server
    Loaded(Vec<String>),
    /// Declared fallback after a failed request
    Fallback {
        /// Fallback options
        options: Vec<String>,
        /// Why the request failed
        error: String,
    },
}

/// One remote option list, fetched once and never revalidated.
#[derive(Debug)]
pub struct RemoteOptions {
    state: OptionsState,
    receiver: Option<Receiver<Result<Vec<String>, FlowError>>>,
    fallback: Vec<String>,
    fresh: bool,
    /// Text typed into the search box
    pub query: String,
}

impl RemoteOptions {
    fn pending(source: &DataSource) -> Self {
        Self {
            state: OptionsState::Loading,
            receiver: None,
            fallback: source.fallback.clone(),
            fresh: false,
            query: String::new(),
        }
    }

    /// Starts fetching `source` in the background. In the browser the fallback list
    /// is used directly.
    pub fn start(source: &DataSource, ctx: Option<eframe::egui::Context>) -> Self {
        let mut remote = Self::pending(source);

        #[cfg(not(target_arch = "wasm32"))]
        {
            let (sender, receiver) = std::sync::mpsc::channel();
            let source = source.clone();
            crate::node::image_decode::spawn_blocking_job(move || {
                let _ = sender.send(fetch_options(&source));
                if let Some(ctx) = ctx {
                    ctx.request_repaint();
                }
            });
            remote.receiver = Some(receiver);
        }

        #[cfg(target_arch = "wasm32")]
        {
            let _ = ctx;
            remote.resolve(Err(FlowError::DataSource {
                endpoint: source.endpoint.clone(),
                message: "remote options are not fetched in the browser".to_string(),
            }));
        }

        remote
    }

    /// Resolves the list with a fetch result, substituting the fallback on failure.
    pub fn resolve(&mut self, result: Result<Vec<String>, FlowError>) {
        self.state = match result {
            Ok(options) => OptionsState::Loaded(options),
            Err(err) => {
                log::warn!("{err}; using fallback options");
                OptionsState::Fallback {
                    options: self.fallback.clone(),
                    error: err.to_string(),
                }
            }
        };
        self.receiver = None;
        self.fresh = true;
    }

    /// Checks the background fetch. Returns `true` when it completed on this call.
    pub fn poll(&mut self) -> bool {
        let Some(receiver) = &self.receiver else {
            return false;
        };
        match receiver.try_recv() {
            Ok(result) => {
                self.resolve(result);
                true
            }
            Err(std::sync::mpsc::TryRecvError::Empty) => false,
            Err(std::sync::mpsc::TryRecvError::Disconnected) => {
                self.resolve(Err(FlowError::Channel("fetch worker exited".to_string())));
                true
            }
        }
    }

    /// Current state.
    pub fn state(&self) -> &OptionsState {
        &self.state
    }

    /// Options to offer right now (empty while loading).
    pub fn options(&self) -> &[String] {
        match &self.state {
            OptionsState::Loading => &[],
            OptionsState::Loaded(options) | OptionsState::Fallback { options, .. } => options,
        }
    }

    /// Returns the options once after they arrive, for pushing into the widget.
    pub fn take_fresh(&mut self) -> Option<Vec<String>> {
        if std::mem::take(&mut self.fresh) {
            Some(self.options().to_vec())
        } else {
            None
        }
    }
}

/// Remote option lists keyed by node and property.
#[derive(Debug, Default)]
pub struct DataSourceCache {
    entries: HashMap<(NodeId, String), RemoteOptions>,
}

impl DataSourceCache {
    /// Returns the list for a widget, starting the fetch on first use.
    pub fn get_or_start(
        &mut self,
        node: NodeId,
        key: &str,
        source: &DataSource,
        ctx: Option<eframe::egui::Context>,
    ) -> &mut RemoteOptions {
        self.entries
            .entry((node, key.to_string()))
            .or_insert_with(|| RemoteOptions::start(source, ctx))
    }

    /// List of a widget if it was started.
    pub fn get_mut(&mut self, node: NodeId, key: &str) -> Option<&mut RemoteOptions> {
        self.entries.get_mut(&(node, key.to_string()))
    }

    /// Drops every list of a removed node.
    pub fn forget_node(&mut self, node: NodeId) {
        self.entries.retain(|(id, _), _| *id != node);
    }

    /// Inserts a list directly, e.g. one resolved synchronously.
    pub fn insert(&mut self, node: NodeId, key: &str, options: RemoteOptions) {
        self.entries.insert((node, key.to_string()), options);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn source(endpoint: &str) -> DataSource {
        DataSource {
            endpoint: endpoint.to_string(),
            transform: Some("models".into()),
            value_field: Some("id".into()),
            fallback: vec!["a".into(), "b".into()],
            ..Default::default()
        }
    }

    #[test]
    fn transform_and_value_field_are_applied() {
        let response = json!({"models": [{"id": "gpt"}, {"id": "llama"}, {"name": "skip"}]});
        let options = extract_options(&response, Some("models"), Some("id")).unwrap();
        assert_eq!(options, vec!["gpt", "llama"]);

        let plain = json!(["x", 2, null]);
        assert_eq!(extract_options(&plain, None, None).unwrap(), vec!["x", "2"]);
        assert!(extract_options(&json!({"other": []}), Some("models"), None).is_err());
    }

    #[test]
    fn filter_is_capped() {
        let options: Vec<String> = (0..500).map(|i| format!("Item {i}")).collect();
        let (shown, total) = filter_options(&options, "", 200);
        assert_eq!((shown.len(), total), (200, 500));
        let (shown, total) = filter_options(&options, "item 49", 200);
        assert_eq!(total, 11);
        assert_eq!(shown.len(), 11);
    }

    #[test]
    fn failure_resolves_to_fallback() {
        let mut remote = RemoteOptions::pending(&source("http://unreachable.invalid"));
        assert_eq!(remote.options().len(), 0);
        remote.resolve(Err(FlowError::DataSource {
            endpoint: "http://unreachable.invalid".into(),
            message: "connection refused".into(),
        }));
        assert_eq!(remote.options(), &["a".to_string(), "b".to_string()]);
        assert!(matches!(remote.state(), OptionsState::Fallback { .. }));
        assert_eq!(remote.take_fresh(), Some(vec!["a".into(), "b".into()]));
        assert_eq!(remote.take_fresh(), None);
    }

    #[cfg(not(target_arch = "wasm32"))]
    #[test]
    fn unreachable_endpoint_uses_fallback() {
        let mut cache = DataSourceCache::default();
        let node = uuid::Uuid::new_v4();
        let remote = cache.get_or_start(node, "model", &source("http://127.0.0.1:1/api/models"), None);
        for _ in 0..400 {
            if remote.poll() {
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(25));
        }
        assert_eq!(remote.options(), &["a".to_string(), "b".to_string()]);
        cache.forget_node(node);
        assert!(cache.get_mut(node, "model").is_none());
    }
}
