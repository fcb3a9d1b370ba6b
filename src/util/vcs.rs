//! Version control helpers.

use std::path::Path;

use git2::Repository;

/// Commit id of `HEAD` for the repository containing `path`.
///
/// Returns `None` outside a repository or on an unborn branch.
pub fn head_commit(path: &Path) -> Option<String> {
    let repo = Repository::discover(path).ok()?;
    let head = repo.head().ok()?;
    let commit = head.peel_to_commit().ok()?;
    Some(commit.id().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_no_repository() {
        let tmp = TempDir::new().unwrap();
        assert_eq!(head_commit(tmp.path()), None);
    }

    #[test]
    fn test_head_commit() {
        let tmp = TempDir::new().unwrap();
        let repo = Repository::init(tmp.path()).unwrap();
        let sig = git2::Signature::now("Test", "test@example.com").unwrap();
        let tree_id = repo.index().unwrap().write_tree().unwrap();
        let tree = repo.find_tree(tree_id).unwrap();
        let oid = repo
            .commit(Some("HEAD"), &sig, &sig, "initial", &tree, &[])
            .unwrap();

        assert_eq!(head_commit(tmp.path()), Some(oid.to_string()));
    }
}
