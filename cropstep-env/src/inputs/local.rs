use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;

use super::{InputRequest, InputSource, SoilProfile, WeatherSeries};
use crate::error::DataAcquisitionError;

/// Reads previously prepared JSON inputs from a directory.
///
/// Weather lives in `<key>.weather.json` and soil in `<soil_id>.soil.json`, where `key` is
/// the location key (soil id for coordinates, upper-cased station id otherwise).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalSource {
    dir: PathBuf,
}

impl LocalSource {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    #[must_use]
    pub fn weather_path(&self, request: &InputRequest) -> PathBuf {
        self.dir
            .join(format!("{}.weather.json", request.location.key()))
    }

    #[must_use]
    pub fn soil_path(&self, request: &InputRequest) -> PathBuf {
        self.dir.join(format!("{}.soil.json", request.soil_id))
    }

    fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, DataAcquisitionError> {
        let text = fs::read_to_string(path).map_err(|source| DataAcquisitionError::Read {
            path: path.display().to_string(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|e| DataAcquisitionError::Decode {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }
}

impl InputSource for LocalSource {
    fn name(&self) -> &str {
        "local"
    }

    fn load_weather(&self, request: &InputRequest) -> Result<WeatherSeries, DataAcquisitionError> {
        Self::read_json(&self.weather_path(request))
    }

    fn load_soil(&self, request: &InputRequest) -> Result<SoilProfile, DataAcquisitionError> {
        Self::read_json(&self.soil_path(request))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EpisodeConfig;
    use crate::inputs::GeneratedSource;

    fn temp_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("cropstep-local-{tag}-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn reads_files_written_from_generated_inputs() {
        let dir = temp_dir("roundtrip");
        let request = InputRequest::from_config(&EpisodeConfig::default());
        let generated = GeneratedSource::default();
        let weather = generated.load_weather(&request).unwrap();
        let soil = generated.load_soil(&request).unwrap();
        let source = LocalSource::new(&dir);
        fs::write(source.weather_path(&request), serde_json::to_string(&weather).unwrap()).unwrap();
        fs::write(source.soil_path(&request), serde_json::to_string(&soil).unwrap()).unwrap();

        assert_eq!(source.load_weather(&request).unwrap(), weather);
        assert_eq!(source.load_soil(&request).unwrap(), soil);
        fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn missing_and_corrupt_files_are_reported() {
        let dir = temp_dir("errors");
        let request = InputRequest::from_config(&EpisodeConfig::default());
        let source = LocalSource::new(&dir);
        assert!(matches!(
            source.load_weather(&request),
            Err(DataAcquisitionError::Read { .. })
        ));
        fs::write(source.soil_path(&request), "{not json").unwrap();
        assert!(matches!(
            source.load_soil(&request),
            Err(DataAcquisitionError::Decode { .. })
        ));
        fs::remove_dir_all(dir).unwrap();
    }
}
