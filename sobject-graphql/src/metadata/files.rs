use std::path::PathBuf;

use async_trait::async_trait;

use super::MetadataSource;
use super::ObjectDescriptor;
use crate::error::MetadataFetchError;

const DESCRIBE_EXTENSION: &str = "json";

/// Reads describe results saved as `<Object>.json` files in one directory.
///
/// The object universe is the set of file stems, sorted by name.
#[derive(Clone, Debug)]
pub struct FileMetadataSource {
    directory: PathBuf,
}

impl FileMetadataSource {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    fn path_for(&self, object: &str) -> PathBuf {
        self.directory
            .join(object)
            .with_extension(DESCRIBE_EXTENSION)
    }
}

#[async_trait]
impl MetadataSource for FileMetadataSource {
    async fn list_objects(&self) -> Result<Vec<String>, MetadataFetchError> {
        let list_error = |err: std::io::Error| MetadataFetchError::List {
            reason: format!("{}: {err}", self.directory.display()),
        };

        let mut entries = tokio::fs::read_dir(&self.directory)
            .await
            .map_err(list_error)?;
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(list_error)? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == DESCRIBE_EXTENSION)
                && let Some(stem) = path.file_stem().and_then(|stem| stem.to_str())
            {
                names.push(stem.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    async fn describe(&self, object: &str) -> Result<ObjectDescriptor, MetadataFetchError> {
        let describe_error = |reason: String| MetadataFetchError::Describe {
            object: object.to_string(),
            reason,
        };

        let path = self.path_for(object);
        let contents = tokio::fs::read(&path)
            .await
            .map_err(|err| describe_error(format!("{}: {err}", path.display())))?;
        serde_json::from_slice(&contents)
            .map_err(|err| describe_error(format!("{}: {err}", path.display())))
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[tokio::test]
    async fn lists_and_describes_json_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("Lead.json"),
            r#"{"name": "Lead", "label": "Lead", "fields": [{"name": "Id", "type": "id"}]}"#,
        )
        .unwrap();
        std::fs::write(
            dir.path().join("Account.json"),
            r#"{"name": "Account", "label": "Account", "fields": []}"#,
        )
        .unwrap();
        std::fs::write(dir.path().join("notes.txt"), "not a describe result").unwrap();

        let source = FileMetadataSource::new(dir.path());
        assert_eq!(
            source.list_objects().await.unwrap(),
            vec!["Account".to_string(), "Lead".to_string()]
        );

        let lead = source.describe("Lead").await.unwrap();
        assert_eq!(lead.name, "Lead");
        assert_eq!(lead.fields.len(), 1);
    }

    #[tokio::test]
    async fn reports_the_object_that_failed() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Broken.json"), "{").unwrap();

        let source = FileMetadataSource::new(dir.path());
        let err = source.describe("Broken").await.unwrap_err();
        assert!(matches!(
            err,
            MetadataFetchError::Describe { ref object, .. } if object == "Broken"
        ));
        assert!(matches!(
            source.describe("Missing").await,
            Err(MetadataFetchError::Describe { .. })
        ));
    }
}
