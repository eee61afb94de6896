//! Line-based three-way merge.
//!
//! Reconciles a base/server/user text trio into one text. Lines present
//! unchanged in all three versions act as anchors that partition the text
//! into aligned segments; each segment resolves automatically when only
//! one side changed it, and collapses to a conflict block around the
//! differing middle (common prefix and suffix factored out) when both
//! sides changed it differently.
//!
//! The conflict block format is part of the persisted content contract
//! and must stay byte-stable:
//!
//! ```text
//! <<<<<<< USER
//! <user lines>
//! =======
//! <server lines>
//! >>>>>>> SERVER
//! ```

/// Opening marker of a conflict block.
pub const CONFLICT_USER_MARKER: &str = "<<<<<<< USER";
/// Separator between the user and server halves of a conflict block.
pub const CONFLICT_SEPARATOR: &str = "=======";
/// Closing marker of a conflict block.
pub const CONFLICT_SERVER_MARKER: &str = ">>>>>>> SERVER";

/// Merge `server` and `user` edits that both started from `base`.
///
/// Pure function: no I/O, no state. Inputs are normalized by trimming
/// trailing whitespace before splitting into lines, so the result never
/// carries a trailing newline.
pub fn merge(base: &str, server: &str, user: &str) -> String {
    let base_lines: Vec<&str> = base.trim_end().split('\n').collect();
    let server_lines: Vec<&str> = server.trim_end().split('\n').collect();
    let user_lines: Vec<&str> = user.trim_end().split('\n').collect();

    // No divergence between the two sides means nothing to reconcile.
    if server_lines == user_lines {
        return user_lines.join("\n");
    }

    let anchors = find_common_anchors(&base_lines, &server_lines, &user_lines);

    let mut result: Vec<&str> = Vec::new();
    let mut prev_base = 0;
    let mut prev_server = 0;
    let mut prev_user = 0;

    for &(anchor_base, anchor_server, anchor_user) in &anchors {
        merge_segment(
            &base_lines[prev_base..anchor_base],
            &server_lines[prev_server..anchor_server],
            &user_lines[prev_user..anchor_user],
            &mut result,
        );
        // The anchor line is unchanged in all versions; emit it verbatim.
        result.push(base_lines[anchor_base]);

        prev_base = anchor_base + 1;
        prev_server = anchor_server + 1;
        prev_user = anchor_user + 1;
    }

    // Tail segment after the last anchor.
    merge_segment(
        &base_lines[prev_base..],
        &server_lines[prev_server..],
        &user_lines[prev_user..],
        &mut result,
    );

    result.join("\n")
}

/// Scan all three line sequences for lines present unchanged in each.
///
/// Returns `(base, server, user)` index triples. The scan advances three
/// cursors together, skipping ahead on whichever side inserted lines; it
/// does not attempt an optimal alignment, which is adequate for the small
/// divergences the editor produces between saves.
fn find_common_anchors(
    base: &[&str],
    server: &[&str],
    user: &[&str],
) -> Vec<(usize, usize, usize)> {
    let mut anchors = Vec::new();
    let mut i_base = 0;
    let mut i_server = 0;
    let mut i_user = 0;

    while i_base < base.len() && i_server < server.len() && i_user < user.len() {
        if base[i_base] == server[i_server] && base[i_base] == user[i_user] {
            anchors.push((i_base, i_server, i_user));
            i_base += 1;
            i_server += 1;
            i_user += 1;
        } else if i_server + 1 < server.len()
            && base[i_base] == server[i_server + 1]
            && i_user + 1 < user.len()
            && base[i_base] == user[i_user + 1]
        {
            i_server += 1;
            i_user += 1;
        } else if i_server + 1 < server.len() && base[i_base] == server[i_server + 1] {
            i_server += 1;
        } else if i_user + 1 < user.len() && base[i_base] == user[i_user + 1] {
            i_user += 1;
        } else {
            i_base += 1;
        }
    }

    anchors
}

/// Resolve one segment bounded by anchors (or sequence start/end).
fn merge_segment<'a>(
    base: &[&'a str],
    server: &[&'a str],
    user: &[&'a str],
    out: &mut Vec<&'a str>,
) {
    // Identical edits, or no divergence between the two sides.
    if user == server {
        out.extend_from_slice(user);
        return;
    }
    // Only one side changed relative to the base: take the changed side.
    if user == base {
        out.extend_from_slice(server);
        return;
    }
    if server == base {
        out.extend_from_slice(user);
        return;
    }

    // Both sides changed. Factor out the common prefix and suffix so the
    // conflict block covers only the differing middle.
    let prefix = common_prefix(user, server);
    let max_suffix = user.len().min(server.len()) - prefix;
    let suffix = common_suffix(user, server).min(max_suffix);

    let user_middle = &user[prefix..user.len() - suffix];
    let server_middle = &server[prefix..server.len() - suffix];

    if user_middle == server_middle {
        out.extend_from_slice(user);
        return;
    }

    out.extend_from_slice(&user[..prefix]);
    out.push(CONFLICT_USER_MARKER);
    out.extend_from_slice(user_middle);
    out.push(CONFLICT_SEPARATOR);
    out.extend_from_slice(server_middle);
    out.push(CONFLICT_SERVER_MARKER);
    out.extend_from_slice(&user[user.len() - suffix..]);
}

fn common_prefix(a: &[&str], b: &[&str]) -> usize {
    a.iter().zip(b.iter()).take_while(|(x, y)| x == y).count()
}

fn common_suffix(a: &[&str], b: &[&str]) -> usize {
    a.iter()
        .rev()
        .zip(b.iter().rev())
        .take_while(|(x, y)| x == y)
        .count()
}
