use std::ffi::CString;
use std::io;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};

use crate::error::Error;

/// Symlink dereference ceiling for `absolute`, mirroring the kernel's own
/// nested-link limit.
const MAX_LINK_DEPTH: u32 = 40;

/// True if `path` is absolute and lexically canonical: starts with `/`,
/// contains no empty, `.` or `..` segments, and does not end with `/` unless
/// it is the root itself.
pub fn is_canonical(path: &str) -> bool {
    enum State {
        Initial,
        Sep,
        Dot,
        DotDot,
        Any,
    }

    let mut state = State::Initial;
    for b in path.bytes() {
        match state {
            State::Initial => {
                if b != b'/' {
                    return false;
                }
                state = State::Sep;
            }
            State::Sep => {
                if b == b'/' {
                    return false;
                } else if b == b'.' {
                    state = State::Dot;
                } else {
                    state = State::Any;
                }
            }
            State::Dot => {
                if b == b'/' {
                    return false;
                } else if b == b'.' {
                    state = State::DotDot;
                } else {
                    state = State::Any;
                }
            }
            State::DotDot => {
                if b == b'/' {
                    return false;
                }
                state = State::Any;
            }
            State::Any => {
                if b == b'/' {
                    state = State::Sep;
                }
            }
        }
    }

    match state {
        State::Any => true,
        State::Sep => path.len() == 1,
        _ => false,
    }
}

/// Length that remains after dropping the trailing component and its
/// separator run. An absolute path that loses its only component keeps the
/// root; a relative one empties out.
fn stripped_len(path: &[u8]) -> usize {
    enum State {
        Initial,
        TrailingSep,
        InComponent,
        LeadingSep,
    }

    let mut state = State::Initial;
    for (pos, &b) in path.iter().enumerate().rev() {
        match state {
            State::Initial => {
                state = if b == b'/' {
                    State::TrailingSep
                } else {
                    State::InComponent
                };
            }
            State::TrailingSep => {
                if b != b'/' {
                    state = State::InComponent;
                }
            }
            State::InComponent => {
                if b == b'/' {
                    state = State::LeadingSep;
                }
            }
            State::LeadingSep => {
                if b != b'/' {
                    return pos + 1;
                }
            }
        }
    }

    if path.first() == Some(&b'/') {
        1
    } else {
        0
    }
}

/// Removes the last path component in place, separator included, tolerating
/// repeated separators. `"/"` stays `"/"`.
pub fn strip_last_component(path: &mut String) {
    let keep = stripped_len(path.as_bytes());
    path.truncate(keep);
}

fn push_component_byte(acc: &mut Vec<u8>, b: u8) {
    if acc.last() != Some(&b'/') {
        acc.push(b'/');
    }
    acc.push(b);
}

fn c_string(path: &str) -> Result<CString, Error> {
    CString::new(path).map_err(|_| Error::BadPath {
        path: path.to_owned(),
        why: "contains a NUL byte",
    })
}

fn lstat_mode(path: &str) -> Option<libc::mode_t> {
    let c = c_string(path).ok()?;
    let mut st: libc::stat = unsafe { std::mem::zeroed() };
    let rc = unsafe { libc::lstat(c.as_ptr(), &mut st) };
    if rc != 0 {
        return None;
    }
    Some(st.st_mode & libc::S_IFMT)
}

/// True if `path` names a directory itself; a symlink to one does not count.
pub fn is_directory(path: &str) -> bool {
    lstat_mode(path) == Some(libc::S_IFDIR)
}

/// True if `path` names a regular file itself; a symlink to one does not
/// count.
pub fn is_regular(path: &str) -> bool {
    lstat_mode(path) == Some(libc::S_IFREG)
}

/// Resolves `path` to an absolute, canonical form. An already-canonical path
/// is returned unchanged without touching the filesystem. Anything else is
/// prefixed with `work_dir` when relative, collapsed lexically (`.` dropped,
/// `..` stripping the accumulated tail), then checked against the filesystem
/// exactly once; a symlink final component is dereferenced and re-resolved
/// against the link's parent directory, up to [`MAX_LINK_DEPTH`] levels.
///
/// `scratch` is reused storage for the resolution pass; its contents
/// afterwards are unspecified.
pub fn absolute(path: &str, work_dir: &str, scratch: &mut Vec<u8>) -> Result<String, Error> {
    absolute_inner(path, work_dir, scratch, 0)
}

fn absolute_inner(
    path: &str,
    work_dir: &str,
    scratch: &mut Vec<u8>,
    depth: u32,
) -> Result<String, Error> {
    if path.is_empty() {
        return Err(Error::EmptyPath);
    }

    if is_canonical(path) {
        return Ok(path.to_owned());
    }

    scratch.clear();
    if !path.starts_with('/') {
        if work_dir.is_empty() {
            return Err(Error::MissingWorkDir);
        }
        scratch.extend_from_slice(work_dir.as_bytes());
    }

    enum State {
        Sep,
        Dot,
        DotDot,
        Any,
    }

    let mut state = State::Sep;
    for b in path.bytes() {
        match state {
            State::Sep => {
                if b == b'.' {
                    state = State::Dot;
                } else if b != b'/' {
                    push_component_byte(scratch, b);
                    state = State::Any;
                }
            }
            State::Dot => {
                if b == b'/' {
                    state = State::Sep;
                } else if b == b'.' {
                    state = State::DotDot;
                } else {
                    push_component_byte(scratch, b'.');
                    scratch.push(b);
                    state = State::Any;
                }
            }
            State::DotDot => {
                if b == b'/' {
                    let keep = stripped_len(scratch);
                    scratch.truncate(keep);
                    state = State::Sep;
                } else {
                    push_component_byte(scratch, b'.');
                    scratch.push(b'.');
                    scratch.push(b);
                    state = State::Any;
                }
            }
            State::Any => {
                if b == b'/' {
                    state = State::Sep;
                } else {
                    scratch.push(b);
                }
            }
        }
    }
    if let State::DotDot = state {
        let keep = stripped_len(scratch);
        scratch.truncate(keep);
    }

    if scratch.is_empty() {
        return Ok("/".to_owned());
    }

    // One authoritative existence check on the collapsed result.
    let resolved = String::from_utf8_lossy(scratch).into_owned();
    let resolved_c = c_string(&resolved)?;
    let mut st: libc::stat = unsafe { std::mem::zeroed() };
    let rc = unsafe { libc::lstat(resolved_c.as_ptr(), &mut st) };
    if rc != 0 {
        return Err(Error::Access {
            path: resolved,
            source: io::Error::last_os_error(),
        });
    }

    if st.st_mode & libc::S_IFMT != libc::S_IFLNK {
        return Ok(resolved);
    }

    if depth >= MAX_LINK_DEPTH {
        return Err(Error::LinkDepth { path: resolved });
    }

    // Final component is a symlink: read the target, growing the buffer until
    // it fits, and resolve it against the link's own parent directory.
    let need = (st.st_size as usize).saturating_add(1);
    let size = scratch.capacity().max(need).max(128);
    scratch.resize(size, 0);

    let target_len = loop {
        let n = unsafe {
            libc::readlink(
                resolved_c.as_ptr(),
                scratch.as_mut_ptr().cast(),
                scratch.len(),
            )
        };
        if n < 0 {
            return Err(Error::ReadLink {
                path: resolved,
                source: io::Error::last_os_error(),
            });
        }
        let n = n as usize;
        if n < scratch.len() {
            break n;
        }
        let grown = scratch.len() * 2;
        scratch.resize(grown, 0);
    };

    let target = match std::str::from_utf8(&scratch[..target_len]) {
        Ok(t) => t.to_owned(),
        Err(_) => {
            return Err(Error::BadPath {
                path: resolved,
                why: "link target is not valid UTF-8",
            })
        }
    };

    let mut parent = resolved;
    strip_last_component(&mut parent);
    absolute_inner(&target, &parent, scratch, depth + 1)
}

/// Ensures every directory along `path` exists, creating missing ones with
/// mode 0755. The walk advances an anchor descriptor from `/` one component
/// at a time, so a prefix vanishing mid-walk surfaces as an error on the
/// component that broke, with the partial path attached. Partially created
/// trees are left in place; re-running converges.
///
/// `path` is expected to be absolute; components are interpreted from the
/// root anchor regardless.
pub fn mkdirs(path: &str) -> Result<(), Error> {
    if is_directory(path) {
        return Ok(());
    }

    let root_c = c_string("/")?;
    let fd = unsafe { libc::open(root_c.as_ptr(), libc::O_PATH) };
    if fd < 0 {
        return Err(Error::Access {
            path: "/".to_owned(),
            source: io::Error::last_os_error(),
        });
    }
    let mut anchor = unsafe { OwnedFd::from_raw_fd(fd) };

    let mut pos = 0usize;
    for comp in path.split('/') {
        let end = pos + comp.len();
        pos = end + 1;
        if comp.is_empty() {
            continue;
        }

        let comp_c = c_string(comp)?;
        let rc = unsafe { libc::mkdirat(anchor.as_raw_fd(), comp_c.as_ptr(), 0o755) };
        if rc != 0 {
            let err = io::Error::last_os_error();
            if err.raw_os_error() != Some(libc::EEXIST) {
                return Err(Error::CreateDir {
                    path: path[..end].to_owned(),
                    source: err,
                });
            }
        }

        let next = unsafe { libc::openat(anchor.as_raw_fd(), comp_c.as_ptr(), libc::O_PATH) };
        if next < 0 {
            return Err(Error::Access {
                path: path[..end].to_owned(),
                source: io::Error::last_os_error(),
            });
        }
        // Dropping the previous anchor closes it as the new one takes over.
        anchor = unsafe { OwnedFd::from_raw_fd(next) };
    }

    Ok(())
}
