//! Path normalization shared by the traversal and the upload server.

/// Convert a dropped path to a relative unix-style path.
///
/// `\dir\file.txt` => `dir/file.txt`
pub fn canonical_path(path: &str) -> String {
    path.replace('\\', "/").trim_start_matches('/').to_string()
}

/// Strip leading slashes and backslashes from every path.
pub fn trim_slash_prefix(paths: &mut [String]) {
    for path in paths.iter_mut() {
        let trimmed = path.trim_start_matches(['/', '\\']);
        if trimmed.len() != path.len() {
            *path = trimmed.to_string();
        }
    }
}

/// Remove the directory prefix shared by all paths.
///
/// Dropping a single folder yields paths that all start with the folder's
/// name; hosting them at the site root needs that prefix gone. Only whole
/// directory components are removed, never part of a name. Fewer than two
/// paths are left alone.
pub fn trim_common_dir_prefix(paths: &mut [String]) {
    if paths.len() < 2 {
        return;
    }

    let common = {
        let dirs: Vec<Vec<&str>> = paths
            .iter()
            .map(|p| {
                let mut parts: Vec<&str> = p.split('/').collect();
                parts.pop();
                parts
            })
            .collect();

        let mut common = 0;
        'outer: while let Some(first) = dirs[0].get(common) {
            for dir in &dirs[1..] {
                if dir.get(common) != Some(first) {
                    break 'outer;
                }
            }
            common += 1;
        }
        common
    };

    if common == 0 {
        return;
    }
    for path in paths.iter_mut() {
        let rest: Vec<&str> = path.split('/').skip(common).collect();
        *path = rest.join("/");
    }
}
