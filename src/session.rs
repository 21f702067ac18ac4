//! Dashboard session: memoized inputs plus per-request section dispatch
//!
//! The dataset and the two boundary layers are loaded at most once per
//! session for a given source. Failed loads are not cached, so the next
//! request tries again.

use crate::aggregate::{aggregate_by, AggregateRecord};
use crate::config::DashboardConfig;
use crate::dataset::{load_dataset, Dataset, LoadOptions};
use crate::error::Result;
use crate::geo::{load_layer, FeatureCollection};
use crate::views::{self, alert, escape, page, AlertKind, Section, ViewRequest};
use log::{error, info, warn};
use std::collections::HashMap;
use std::hash::Hash;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, TryLockError};
use std::time::Duration;

type Slot<V> = Arc<Mutex<Option<Arc<V>>>>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Compute-once cache keyed by input; entries live as long as the cache
///
/// Each key has its own slot. Callers asking for the same key wait for the
/// first computation; other keys proceed independently.
pub struct Memo<K, V> {
    slots: Mutex<HashMap<K, Slot<V>>>,
}

impl<K: Eq + Hash, V> Memo<K, V> {
    pub fn new() -> Self {
        Self { slots: Mutex::new(HashMap::new()) }
    }

    /// Return the cached value or compute it; errors are returned, not cached
    pub fn get_or_try_insert_with<E>(
        &self,
        key: K,
        compute: impl FnOnce() -> std::result::Result<V, E>,
    ) -> std::result::Result<Arc<V>, E> {
        let slot = Arc::clone(lock(&self.slots).entry(key).or_default());
        let mut value = lock(&*slot);
        if let Some(cached) = value.as_ref() {
            return Ok(Arc::clone(cached));
        }
        let computed = Arc::new(compute()?);
        *value = Some(Arc::clone(&computed));
        Ok(computed)
    }

    /// Number of keys holding a computed value; slots still computing are skipped
    pub fn len(&self) -> usize {
        lock(&self.slots)
            .values()
            .filter(|slot| match slot.try_lock() {
                Ok(value) => value.is_some(),
                Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner().is_some(),
                Err(TryLockError::WouldBlock) => false,
            })
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<K: Eq + Hash, V> Default for Memo<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

pub struct DashboardSession {
    config: DashboardConfig,
    datasets: Memo<(PathBuf, String), Dataset>,
    layers: Memo<String, FeatureCollection>,
}

impl DashboardSession {
    pub fn new(config: DashboardConfig) -> Self {
        Self {
            config,
            datasets: Memo::new(),
            layers: Memo::new(),
        }
    }

    pub fn config(&self) -> &DashboardConfig {
        &self.config
    }

    /// The pruned dataset, loaded on first use
    pub fn dataset(&self) -> Result<Arc<Dataset>> {
        let key = (self.config.data_path.clone(), self.config.sheet.clone());
        self.datasets.get_or_try_insert_with(key, || {
            load_dataset(&self.config.data_path, &LoadOptions::from(&self.config))
        })
    }

    /// A boundary layer, fetched on first use
    pub fn layer(&self, source: &str) -> Result<Arc<FeatureCollection>> {
        let timeout = Duration::from_secs(self.config.fetch_timeout_secs);
        self.layers
            .get_or_try_insert_with(source.to_string(), || load_layer(source, timeout))
    }

    pub fn regions(&self) -> Result<Arc<FeatureCollection>> {
        self.layer(&self.config.regions_source)
    }

    pub fn communes(&self) -> Result<Arc<FeatureCollection>> {
        self.layer(&self.config.communes_source)
    }

    /// Groupwise counts and means of the risk and AAL columns
    pub fn aggregate(&self, key_column: &str) -> Result<Vec<AggregateRecord>> {
        let dataset = self.dataset()?;
        aggregate_by(&dataset, key_column, &self.config.risk_column, &self.config.aal_column)
    }

    /// Render the full page for one interaction
    ///
    /// A dataset failure fails the page. Anything that goes wrong inside a
    /// section (bad selection, missing column, geometry fetch) is shown in
    /// that section only.
    pub fn render(&self, request: &ViewRequest) -> Result<String> {
        let dataset = self.dataset()?;
        info!("Rendering section '{}'", request.section.slug());
        let body = self.render_section(&dataset, request);
        Ok(page(request.section, &body))
    }

    fn render_section(&self, dataset: &Dataset, request: &ViewRequest) -> String {
        let config = &self.config;
        let result = match request.section {
            Section::Overview => views::overview(dataset, config.preview_rows),
            Section::Univariate => {
                views::univariate(dataset, request.variable.as_deref(), config.histogram_bins)
            }
            Section::Bivariate => views::bivariate(
                dataset,
                request.x.as_deref(),
                request.y.as_deref(),
                request.color.as_deref(),
            ),
            Section::Correlation => views::correlation(dataset),
            Section::RegionMap => match self.regions() {
                Ok(regions) => views::region_map(dataset, config, &regions),
                Err(e) => return geometry_failure(request.section, "regiones", &e.to_string()),
            },
            Section::CommuneMap => match self.communes() {
                Ok(communes) => views::commune_map(dataset, config, &communes),
                Err(e) => return geometry_failure(request.section, "comunas", &e.to_string()),
            },
        };

        result.unwrap_or_else(|e| {
            warn!("Section '{}' failed: {}", request.section.slug(), e);
            alert(AlertKind::Error, &e.to_string())
        })
    }
}

fn geometry_failure(section: Section, layer: &str, message: &str) -> String {
    error!("Failed to load {} geometry: {}", layer, message);
    format!(
        "<h1>{}</h1>{}",
        escape(section.label()),
        alert(
            AlertKind::Error,
            &format!("No se pudo cargar la geometría de {}: {}", layer, message)
        )
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::io::Write;
    use std::sync::mpsc;
    use std::thread;

    const DATA: &str = "\
accgrpid,cluster_geo,occtype_grp,risk_load,AAL_usd,city
1,13,RES,10.0,100,Santiago
2,13,RES,20.0,300,Santiago
3,5,COM,5.0,50,Valparaiso
";

    const LAYER: &str = r#"{"type": "FeatureCollection", "features": [
        {"type": "Feature", "properties": {"region_id": 13, "region_name": "Región Metropolitana", "city": "Santiago", "comuna_name": "Santiago"},
         "geometry": {"type": "Polygon", "coordinates": [[[-70.8, -33.6], [-70.5, -33.6], [-70.5, -33.3], [-70.8, -33.6]]]}}
    ]}"#;

    fn temp_file(suffix: &str, contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new()
            .suffix(suffix)
            .tempfile()
            .expect("Failed to create temp file");
        file.write_all(contents.as_bytes()).expect("Failed to write");
        file
    }

    fn session(data: &tempfile::NamedTempFile, layer: &str) -> DashboardSession {
        DashboardSession::new(DashboardConfig {
            data_path: data.path().to_path_buf(),
            regions_source: layer.to_string(),
            communes_source: layer.to_string(),
            ..Default::default()
        })
    }

    #[test]
    fn test_memo_computes_once() {
        let memo: Memo<&str, usize> = Memo::new();
        let calls = Cell::new(0);
        for _ in 0..3 {
            let v = memo
                .get_or_try_insert_with("k", || {
                    calls.set(calls.get() + 1);
                    Ok::<_, ()>(42)
                })
                .unwrap();
            assert_eq!(*v, 42);
        }
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_memo_does_not_cache_errors() {
        let memo: Memo<&str, usize> = Memo::new();
        assert!(memo.get_or_try_insert_with("k", || Err::<usize, _>("down")).is_err());
        assert!(memo.is_empty());
        assert_eq!(*memo.get_or_try_insert_with("k", || Ok::<_, &str>(1)).unwrap(), 1);
    }

    #[test]
    fn test_memo_keys_compute_independently() {
        let memo: Arc<Memo<&str, usize>> = Arc::new(Memo::new());
        let (started_tx, started_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel::<()>();

        let slow = {
            let memo = Arc::clone(&memo);
            thread::spawn(move || {
                memo.get_or_try_insert_with("regions", || {
                    started_tx.send(()).expect("send");
                    release_rx.recv().expect("recv");
                    Ok::<_, ()>(1)
                })
            })
        };

        started_rx.recv().expect("slow load started");
        // "regions" is still computing; another key must not wait for it
        let communes = memo.get_or_try_insert_with("communes", || Ok::<_, ()>(2)).unwrap();
        assert_eq!(*communes, 2);
        assert_eq!(memo.len(), 1);

        release_tx.send(()).expect("release");
        assert_eq!(*slow.join().expect("join").unwrap(), 1);
        assert_eq!(memo.len(), 2);
        assert_eq!(*memo.get_or_try_insert_with("regions", || Err(())).unwrap(), 1);
    }

    #[test]
    fn test_dataset_loaded_once() {
        let data = temp_file(".csv", DATA);
        let s = session(&data, "/nonexistent.geojson");
        let a = s.dataset().expect("load");
        let b = s.dataset().expect("load");
        assert!(Arc::ptr_eq(&a, &b));
        assert!(!a.has_column("accgrpid"));
    }

    #[test]
    fn test_render_every_section() {
        let data = temp_file(".csv", DATA);
        let layer = temp_file(".geojson", LAYER);
        let s = session(&data, &layer.path().to_string_lossy());

        for section in Section::ALL {
            let html = s.render(&ViewRequest::new(section)).expect("render");
            assert!(html.starts_with("<!DOCTYPE html>"));
            assert!(!html.contains("class=\"alert error\""), "section {} failed", section.slug());
        }
        // Both layers share one source, so one cached entry
        assert_eq!(s.layers.len(), 1);
    }

    #[test]
    fn test_geometry_failure_is_section_local() {
        let data = temp_file(".csv", DATA);
        let s = session(&data, "/nonexistent/regiones.geojson");

        let html = s.render(&ViewRequest::new(Section::RegionMap)).expect("page still renders");
        assert!(html.contains("No se pudo cargar la geometría de regiones"));
        assert!(s.layers.is_empty());

        let overview = s.render(&ViewRequest::new(Section::Overview)).expect("render");
        assert!(!overview.contains("class=\"alert error\""));
    }

    #[test]
    fn test_bad_selection_shown_inline() {
        let data = temp_file(".csv", DATA);
        let s = session(&data, "/nonexistent.geojson");
        let request = ViewRequest {
            variable: Some("nope".to_string()),
            ..ViewRequest::new(Section::Univariate)
        };
        let html = s.render(&request).expect("render");
        assert!(html.contains("Invalid selection"));
    }

    #[test]
    fn test_missing_dataset_fails_page() {
        let s = DashboardSession::new(DashboardConfig {
            data_path: PathBuf::from("/nonexistent/base_agrup.csv"),
            ..Default::default()
        });
        assert!(s.render(&ViewRequest::default()).is_err());
    }

    #[test]
    fn test_aggregate_scenario() {
        let data = temp_file(".csv", DATA);
        let s = session(&data, "/nonexistent.geojson");
        let aggs = s.aggregate("cluster_geo").expect("aggregate");
        assert_eq!(aggs.len(), 2);
        assert_eq!(aggs[1].key, "13");
        assert_eq!(aggs[1].count, 2);
        assert_eq!(aggs[1].risk_avg, Some(15.0));
    }
}
