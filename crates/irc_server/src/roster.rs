//! Roster file loader (§6, C11): `servername,host,port,passwd` per line.
//! Only the interface the core consumes is in scope — this module's job
//! ends at producing a `Vec<RosterEntry>` for the registration handshake
//! (§4.C7's PASS/SERVER case); consuming the *other* entries for relay is
//! future work (§9 open question).

use std::fmt;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterEntry {
    pub servername: String,
    pub host: String,
    pub port: u16,
    pub passwd: String,
}

#[derive(Debug)]
pub enum RosterError {
    Io(std::io::Error),
    Malformed { line: usize, text: String },
    DuplicateServer(String),
    MissingSelf(String),
}

impl fmt::Display for RosterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RosterError::Io(e) => write!(f, "could not read roster file: {e}"),
            RosterError::Malformed { line, text } => {
                write!(f, "malformed roster entry at line {line}: '{text}'")
            }
            RosterError::DuplicateServer(name) => {
                write!(f, "duplicate servername '{name}' in roster")
            }
            RosterError::MissingSelf(name) => {
                write!(f, "roster has no entry for this server ('{name}')")
            }
        }
    }
}

pub fn load(path: impl AsRef<Path>) -> Result<Vec<RosterEntry>, RosterError> {
    let content = fs::read_to_string(path).map_err(RosterError::Io)?;
    let mut entries = Vec::new();
    for (idx, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        let [servername, host, port, passwd] = fields.as_slice() else {
            return Err(RosterError::Malformed {
                line: idx + 1,
                text: line.to_string(),
            });
        };
        let port: u16 = port.parse().map_err(|_| RosterError::Malformed {
            line: idx + 1,
            text: line.to_string(),
        })?;
        if entries
            .iter()
            .any(|e: &RosterEntry| e.servername == *servername)
        {
            return Err(RosterError::DuplicateServer(servername.to_string()));
        }
        entries.push(RosterEntry {
            servername: servername.to_string(),
            host: host.to_string(),
            port,
            passwd: passwd.to_string(),
        });
    }
    Ok(entries)
}

pub fn require_self(entries: &[RosterEntry], server_name: &str) -> Result<(), RosterError> {
    if entries.iter().any(|e| e.servername == server_name) {
        Ok(())
    } else {
        Err(RosterError::MissingSelf(server_name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn parses_well_formed_roster() {
        let path = tempfile("parses_well_formed_roster");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(f, "irc1,host1,6667,secret1").unwrap();
        writeln!(f, "irc2,host2,6668,secret2").unwrap();
        let entries = load(&path).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].servername, "irc1");
        assert_eq!(entries[1].port, 6668);
    }

    #[test]
    fn rejects_duplicate_servername() {
        let path = tempfile("rejects_duplicate_servername");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(f, "irc1,host1,6667,secret1").unwrap();
        writeln!(f, "irc1,host2,6668,secret2").unwrap();
        assert!(matches!(load(&path), Err(RosterError::DuplicateServer(_))));
    }

    #[test]
    fn requires_self_entry() {
        let path = tempfile("requires_self_entry");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(f, "irc1,host1,6667,secret1").unwrap();
        let entries = load(&path).unwrap();
        assert!(require_self(&entries, "irc1").is_ok());
        assert!(require_self(&entries, "irc2").is_err());
    }

    fn tempfile(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("irc_server_roster_test_{name}_{}", std::process::id()))
    }
}
