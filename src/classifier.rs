//! Classification of collected paths by the lifetime of their backing storage.
//!
//! Log files under the container runtime's data root or under the kubelet's
//! volume root live on storage that is torn down together with the entity that
//! wrote them. Everything else is host-bound and may outlive the entity.
use std::path::Path;

/// Container runtime data root, relative to the host mount.
const DOCKER_SYSTEM_PATH: &str = "var/lib/docker";
/// Kubelet pod volume root, relative to the host mount.
const KUBELET_SYSTEM_PATH: &str = "var/lib/kubelet";

/// Backing store of a collected path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Storage {
    /// Removed by the runtime when the entity is torn down.
    Ephemeral,
    /// Host-bound; content may outlive the entity.
    Durable,
}

#[derive(Debug, Clone)]
pub struct PathClassifier {
    ephemeral_roots: [String; 2],
}

impl PathClassifier {
    /// Creates a classifier for a host whose root filesystem is mounted at `base_dir`.
    ///
    /// An empty `base_dir` means the host root is the local root.
    pub fn new(base_dir: impl AsRef<Path>) -> Self {
        let base_dir = base_dir.as_ref();
        let base_dir = if base_dir.as_os_str().is_empty() {
            Path::new("/")
        } else {
            base_dir
        };
        let root = |rel: &str| -> String { base_dir.join(rel).to_string_lossy().into_owned() };
        Self {
            ephemeral_roots: [root(DOCKER_SYSTEM_PATH), root(KUBELET_SYSTEM_PATH)],
        }
    }

    /// Returns the storage class of `path`, judged by its parent directory.
    ///
    /// The parent is matched as a plain string prefix against both ephemeral
    /// roots, so glob characters in the final path component do not matter.
    pub fn classify(&self, path: impl AsRef<Path>) -> Storage {
        let parent = path
            .as_ref()
            .parent()
            .map(Path::to_string_lossy)
            .unwrap_or_default();
        if self
            .ephemeral_roots
            .iter()
            .any(|root| parent.starts_with(root.as_str()))
        {
            Storage::Ephemeral
        } else {
            Storage::Durable
        }
    }

    #[cfg(test)]
    fn is_ephemeral(&self, path: impl AsRef<Path>) -> bool {
        self.classify(path) == Storage::Ephemeral
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_without_base_dir() {
        let classifier = PathClassifier::new("");
        assert!(classifier.is_ephemeral("/var/lib/docker/containers/c1/*.log"));
        assert!(classifier.is_ephemeral(
            "/var/lib/kubelet/pods/uid/volumes/kubernetes.io~empty-dir/logs/app.log"
        ));
        assert_eq!(classifier.classify("/data/app/out.log"), Storage::Durable);
        assert_eq!(classifier.classify("/var/lib/app.log"), Storage::Durable);
    }

    #[test]
    fn test_classify_with_base_dir() {
        let classifier = PathClassifier::new("/host");
        assert!(classifier.is_ephemeral("/host/var/lib/docker/containers/c1/c1-json.log"));
        assert!(!classifier.is_ephemeral("/var/lib/docker/containers/c1/c1-json.log"));
        assert!(!classifier.is_ephemeral("/host/data/app/out.log"));
    }

    #[test]
    fn test_classify_uses_parent_directory() {
        let classifier = PathClassifier::new("/");
        // parent is `/var/lib`
        assert!(!classifier.is_ephemeral("/var/lib/docker"));
        assert!(classifier.is_ephemeral("/var/lib/docker/x.log"));
        // plain prefix match, not component-wise
        assert!(classifier.is_ephemeral("/var/lib/docker-volumes/x.log"));
    }

    #[test]
    fn test_ephemeral_roots() {
        let classifier = PathClassifier::new("/host");
        assert_eq!(
            classifier.ephemeral_roots,
            ["/host/var/lib/docker", "/host/var/lib/kubelet"]
        );
    }
}
