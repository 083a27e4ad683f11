use crate::{
    core::{
        document::store::DocumentStore,
        model::{DocumentSource, DocumentType},
    },
    err,
    error::MedragError,
    map_err,
};
use std::{
    path::{Path, PathBuf},
    str::FromStr,
};
use tracing::{debug, info, warn};

/// Simple FS based implementation of a [DocumentStore].
/// Serves all supported files in a single directory.
#[derive(Debug, Clone)]
pub struct FsDocumentStore {
    /// The directory holding the documents.
    base: PathBuf,
}

impl FsDocumentStore {
    pub fn new(path: &str) -> Self {
        let base = PathBuf::from_str(path)
            .expect("invalid path")
            .canonicalize()
            .unwrap_or_else(|e| panic!("unable to canonicalize {path}: {e}"));

        if !base.is_dir() {
            panic!("not a directory: {path}");
        }

        info!("Initialising fs store at {}", base.display());

        Self { base }
    }

    fn get_extension(&self, pb: &Path) -> Result<DocumentType, MedragError> {
        if !pb.is_file() {
            return err!(InvalidFileName, "not a file: {}", pb.display());
        }

        let Some(ext) = pb.extension() else {
            return err!(InvalidFileName, "missing extension: {}", pb.display());
        };

        let Some(ext) = ext.to_str() else {
            return err!(InvalidFileName, "extension invalid unicode: {:?}", ext);
        };

        DocumentType::try_from(ext)
    }

    async fn source(&self, path: &Path, name: String) -> Result<DocumentSource, MedragError> {
        let ty = self.get_extension(path)?;
        let metadata = map_err!(tokio::fs::metadata(path).await);

        Ok(DocumentSource {
            name,
            path: path.display().to_string(),
            ty,
            size: metadata.len(),
        })
    }
}

#[async_trait::async_trait]
impl DocumentStore for FsDocumentStore {
    fn id(&self) -> &'static str {
        "fs"
    }

    async fn list(&self) -> Result<Vec<DocumentSource>, MedragError> {
        let mut files = map_err!(tokio::fs::read_dir(&self.base).await);
        let mut sources = vec![];

        while let Some(file) = map_err!(files.next_entry().await) {
            let name = file.file_name().to_string_lossy().to_string();

            match self.source(&file.path(), name).await {
                Ok(source) => sources.push(source),
                Err(e) => debug!("Skipping {}: {e}", file.path().display()),
            }
        }

        sources.sort_by(|a, b| a.name.cmp(&b.name));

        Ok(sources)
    }

    async fn get(&self, name: &str) -> Result<DocumentSource, MedragError> {
        if name.is_empty() || name.contains(['/', '\\']) || name == ".." {
            return err!(InvalidFileName, "{name}");
        }

        let path = self.base.join(name);

        if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return err!(DoesNotExist, "Document '{name}'");
        }

        self.source(&path, name.to_string()).await
    }

    async fn read(&self, source: &DocumentSource) -> Result<Vec<u8>, MedragError> {
        debug!("Reading {}", source.path);
        let content = tokio::fs::read(&source.path).await;

        if let Err(ref e) = content {
            if e.kind() == std::io::ErrorKind::NotFound {
                warn!("Document '{}' removed from storage", source.name);
                return err!(DoesNotExist, "Document '{}'", source.name);
            }
        }

        Ok(map_err!(content))
    }
}

#[cfg(test)]
mod tests {
    use super::{DocumentStore, FsDocumentStore};
    use crate::{core::model::DocumentType, error::MedragErr};

    const DIR: &str = "__fs_doc_store_tests";
    const CONTENT: &str = "Hello world.";

    #[tokio::test]
    async fn works() {
        let _ = tokio::fs::remove_dir_all(DIR).await;
        tokio::fs::create_dir(DIR).await.unwrap();

        tokio::fs::write(format!("{DIR}/b.txt"), CONTENT).await.unwrap();
        tokio::fs::write(format!("{DIR}/a.md"), CONTENT).await.unwrap();
        tokio::fs::write(format!("{DIR}/ignored.docx"), CONTENT).await.unwrap();

        let store = FsDocumentStore::new(DIR);

        let sources = store.list().await.unwrap();
        let names = sources.iter().map(|s| s.name.as_str()).collect::<Vec<_>>();
        assert_eq!(vec!["a.md", "b.txt"], names);
        assert_eq!(DocumentType::Text, sources[0].ty);
        assert_eq!(CONTENT.len() as u64, sources[0].size);

        let source = store.get("b.txt").await.unwrap();
        let content = store.read(&source).await.unwrap();
        assert_eq!(CONTENT.as_bytes(), content);

        let missing = store.get("c.txt").await.unwrap_err();
        assert!(matches!(missing.error, MedragErr::DoesNotExist(_)));

        let escape = store.get("../Cargo.toml").await.unwrap_err();
        assert!(matches!(escape.error, MedragErr::InvalidFileName(_)));

        tokio::fs::remove_dir_all(DIR).await.unwrap();
    }
}
