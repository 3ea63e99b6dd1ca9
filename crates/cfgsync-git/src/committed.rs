//! Read-only access to the files committed at `HEAD`.

use std::path::Path;

use cfgsync_fs::NormalizedPath;
use git2::{ErrorCode, ObjectType, Oid, Repository};

use crate::{CommitInfo, Error, Result};

/// A file as it was recorded in the baseline commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommittedFile {
    /// File name within its directory
    pub name: String,
    /// Raw committed bytes
    pub content: Vec<u8>,
}

/// Snapshot of the `HEAD` tree for a workspace inside a git working tree.
///
/// Paths passed to the accessors are relative to the workspace root, which
/// may be a subdirectory of the repository.
pub struct CommittedTree {
    repo: Repository,
    /// Workspace root relative to the repository workdir ("" when identical)
    prefix: String,
    /// `HEAD` tree; `None` while the branch is unborn
    tree: Option<Oid>,
    head: Option<CommitInfo>,
}

impl CommittedTree {
    /// Discover the working tree containing `workspace_root`.
    ///
    /// Returns `Ok(None)` when there is no usable working tree (no
    /// repository, a bare repository, or an unreadable `.git` marker).
    pub fn discover(workspace_root: &Path) -> Result<Option<Self>> {
        let repo = match Repository::discover(workspace_root) {
            Ok(repo) => repo,
            Err(e) if e.code() == ErrorCode::NotFound => return Ok(None),
            Err(e) => {
                tracing::warn!(
                    path = %workspace_root.display(),
                    error = %e,
                    "Ignoring unreadable git repository; committed baselines unavailable"
                );
                return Ok(None);
            }
        };

        let Some(workdir) = repo.workdir() else {
            return Ok(None);
        };
        let workdir = NormalizedPath::canonicalize(workdir)?;
        let root = NormalizedPath::canonicalize(workspace_root)?;

        let prefix = if root.as_str().trim_end_matches('/') == workdir.as_str().trim_end_matches('/')
        {
            String::new()
        } else {
            root.strip_prefix(&workdir)
                .ok_or_else(|| Error::OutsideWorkTree {
                    path: workspace_root.to_path_buf(),
                })?
                .to_string()
        };

        let (tree, head) = match repo.head() {
            Ok(reference) => {
                let commit = reference.peel_to_commit()?;
                (Some(commit.tree_id()), Some(CommitInfo::from_commit(&commit)))
            }
            Err(e) if matches!(e.code(), ErrorCode::UnbornBranch | ErrorCode::NotFound) => {
                (None, None)
            }
            Err(e) => return Err(e.into()),
        };

        tracing::debug!(
            prefix = %prefix,
            head = head.as_ref().map(|h| h.hash.as_str()).unwrap_or("<unborn>"),
            "Discovered git working tree"
        );

        Ok(Some(Self {
            repo,
            prefix,
            tree,
            head,
        }))
    }

    /// The baseline commit, if the branch has any history.
    pub fn head(&self) -> Option<&CommitInfo> {
        self.head.as_ref()
    }

    /// Committed content of a single file, or `None` if it is not in `HEAD`.
    pub fn read_file(&self, relative: &str) -> Result<Option<Vec<u8>>> {
        let Some(tree_id) = self.tree else {
            return Ok(None);
        };
        let tree = self.repo.find_tree(tree_id)?;

        let entry = match tree.get_path(Path::new(&self.repo_path(relative))) {
            Ok(entry) => entry,
            Err(e) if e.code() == ErrorCode::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        if entry.kind() != Some(ObjectType::Blob) {
            return Ok(None);
        }

        let blob = self.repo.find_blob(entry.id())?;
        Ok(Some(blob.content().to_vec()))
    }

    /// All files committed directly inside `relative_dir`, sorted by name.
    pub fn list_dir(&self, relative_dir: &str) -> Result<Vec<CommittedFile>> {
        let Some(tree_id) = self.tree else {
            return Ok(Vec::new());
        };
        let root_tree = self.repo.find_tree(tree_id)?;

        let repo_dir = self.repo_path(relative_dir);
        let dir_tree = if repo_dir.is_empty() {
            root_tree
        } else {
            match root_tree.get_path(Path::new(&repo_dir)) {
                Ok(entry) => match entry.to_object(&self.repo)?.into_tree() {
                    Ok(tree) => tree,
                    Err(_) => return Ok(Vec::new()),
                },
                Err(e) if e.code() == ErrorCode::NotFound => return Ok(Vec::new()),
                Err(e) => return Err(e.into()),
            }
        };

        let mut files = Vec::new();
        for entry in dir_tree.iter() {
            if entry.kind() != Some(ObjectType::Blob) {
                continue;
            }
            let Some(name) = entry.name() else {
                continue;
            };
            let blob = self.repo.find_blob(entry.id())?;
            files.push(CommittedFile {
                name: name.to_string(),
                content: blob.content().to_vec(),
            });
        }
        files.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(files)
    }

    fn repo_path(&self, relative: &str) -> String {
        let relative = relative.trim_matches('/');
        match (self.prefix.is_empty(), relative.is_empty()) {
            (true, _) => relative.to_string(),
            (false, true) => self.prefix.clone(),
            (false, false) => format!("{}/{}", self.prefix, relative),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cfgsync_test_utils::git::{commit_all, fake_git_dir, real_git_repo};
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn discover_outside_repository_is_none() {
        let temp = TempDir::new().unwrap();
        assert!(CommittedTree::discover(temp.path()).unwrap().is_none());
    }

    #[test]
    fn discover_tolerates_fake_git_marker() {
        let temp = TempDir::new().unwrap();
        fake_git_dir(temp.path());
        assert!(CommittedTree::discover(temp.path()).unwrap().is_none());
    }

    #[test]
    fn unborn_branch_has_no_committed_files() {
        let temp = TempDir::new().unwrap();
        real_git_repo(temp.path());

        let tree = CommittedTree::discover(temp.path()).unwrap().unwrap();
        assert!(tree.head().is_none());
        assert!(tree.list_dir("queues").unwrap().is_empty());
        assert_eq!(tree.read_file("queues/a_1.json").unwrap(), None);
    }

    #[test]
    fn committed_content_ignores_working_tree_edits() {
        let temp = TempDir::new().unwrap();
        let repo = real_git_repo(temp.path());
        fs::create_dir_all(temp.path().join("queues")).unwrap();
        fs::write(temp.path().join("queues/main_1.json"), "{\"v\": 1}\n").unwrap();
        commit_all(&repo, "pull");

        fs::write(temp.path().join("queues/main_1.json"), "{\"v\": 2}\n").unwrap();
        fs::write(temp.path().join("queues/new_2.json"), "{}\n").unwrap();

        let tree = CommittedTree::discover(temp.path()).unwrap().unwrap();
        assert_eq!(tree.head().unwrap().message, "pull");

        let files = tree.list_dir("queues").unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].name, "main_1.json");
        assert_eq!(files[0].content, b"{\"v\": 1}\n".to_vec());
        assert_eq!(tree.read_file("queues/new_2.json").unwrap(), None);
    }

    #[test]
    fn workspace_in_subdirectory_resolves_prefix() {
        let temp = TempDir::new().unwrap();
        let repo = real_git_repo(temp.path());
        let ws = temp.path().join("deploy/prod");
        fs::create_dir_all(ws.join("schemas")).unwrap();
        fs::write(ws.join("schemas/s_200.json"), "{}\n").unwrap();
        commit_all(&repo, "initial");

        let tree = CommittedTree::discover(&ws).unwrap().unwrap();
        assert_eq!(tree.read_file("schemas/s_200.json").unwrap(), Some(b"{}\n".to_vec()));
        assert_eq!(tree.list_dir("schemas").unwrap().len(), 1);
    }
}
