// src/version/nevra.rs

//! NEVRA (name-epoch:version-release.arch) parsing
//!
//! A user spec such as `foo-1.0-1.x86_64` can be read in several ways.
//! [`Nevra::parse`] splits a spec according to one [`NevraForm`]; the
//! package query tries the forms in [`Nevra::PKG_SPEC_FORMS`] order.

use std::fmt;

/// Ways a package spec can be split
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NevraForm {
    Nevra,
    Nevr,
    Nev,
    Na,
    Name,
}

/// A (possibly partial) NEVRA; empty fields are unspecified
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Nevra {
    pub name: String,
    pub epoch: String,
    pub version: String,
    pub release: String,
    pub arch: String,
}

impl Nevra {
    /// Forms tried when resolving a package spec, in order
    pub const PKG_SPEC_FORMS: [NevraForm; 5] = [
        NevraForm::Nevra,
        NevraForm::Na,
        NevraForm::Name,
        NevraForm::Nevr,
        NevraForm::Nev,
    ];

    /// Split `spec` according to `form`; `None` if it does not fit
    pub fn parse(spec: &str, form: NevraForm) -> Option<Self> {
        if spec.is_empty() {
            return None;
        }
        match form {
            NevraForm::Name => Some(Self {
                name: spec.to_string(),
                ..Default::default()
            }),
            NevraForm::Na => {
                let (name, arch) = split_arch(spec)?;
                Some(Self {
                    name: name.to_string(),
                    arch: arch.to_string(),
                    ..Default::default()
                })
            }
            NevraForm::Nev => {
                let (name, ev) = spec.rsplit_once('-')?;
                let (epoch, version) = split_epoch(ev)?;
                non_empty(name)?;
                Some(Self {
                    name: name.to_string(),
                    epoch: epoch.to_string(),
                    version: version.to_string(),
                    ..Default::default()
                })
            }
            NevraForm::Nevr => parse_nevr(spec),
            NevraForm::Nevra => {
                let (nevr, arch) = split_arch(spec)?;
                let mut nevra = parse_nevr(nevr)?;
                nevra.arch = arch.to_string();
                Some(nevra)
            }
        }
    }

    /// Whether only the name is specified
    pub fn has_just_name(&self) -> bool {
        self.epoch.is_empty()
            && self.version.is_empty()
            && self.release.is_empty()
            && self.arch.is_empty()
    }
}

fn non_empty(s: &str) -> Option<&str> {
    if s.is_empty() { None } else { Some(s) }
}

fn split_arch(spec: &str) -> Option<(&str, &str)> {
    let (rest, arch) = spec.rsplit_once('.')?;
    non_empty(rest)?;
    non_empty(arch)?;
    if arch.contains(['-', ':']) {
        return None;
    }
    Some((rest, arch))
}

fn split_epoch(ev: &str) -> Option<(&str, &str)> {
    match ev.split_once(':') {
        Some((epoch, version)) => {
            if epoch.is_empty() || !epoch.bytes().all(|b| b.is_ascii_digit() || b == b'*') {
                return None;
            }
            Some((epoch, non_empty(version)?))
        }
        None => Some(("", non_empty(ev)?)),
    }
}

fn parse_nevr(spec: &str) -> Option<Nevra> {
    let (nev, release) = spec.rsplit_once('-')?;
    non_empty(release)?;
    if release.contains(':') {
        return None;
    }
    let (name, ev) = nev.rsplit_once('-')?;
    non_empty(name)?;
    let (epoch, version) = split_epoch(ev)?;
    Some(Nevra {
        name: name.to_string(),
        epoch: epoch.to_string(),
        version: version.to_string(),
        release: release.to_string(),
        arch: String::new(),
    })
}

impl fmt::Display for Nevra {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if !self.version.is_empty() {
            write!(f, "-")?;
            if !self.epoch.is_empty() && self.epoch != "0" {
                write!(f, "{}:", self.epoch)?;
            }
            write!(f, "{}", self.version)?;
        }
        if !self.release.is_empty() {
            write!(f, "-{}", self.release)?;
        }
        if !self.arch.is_empty() {
            write!(f, ".{}", self.arch)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_nevra() {
        let n = Nevra::parse("foo-bar-1:2.0-3.fc40.x86_64", NevraForm::Nevra).unwrap();
        assert_eq!(n.name, "foo-bar");
        assert_eq!(n.epoch, "1");
        assert_eq!(n.version, "2.0");
        assert_eq!(n.release, "3.fc40");
        assert_eq!(n.arch, "x86_64");
        assert_eq!(n.to_string(), "foo-bar-1:2.0-3.fc40.x86_64");
    }

    #[test]
    fn test_parse_na_and_name() {
        let n = Nevra::parse("glibc.i686", NevraForm::Na).unwrap();
        assert_eq!(n.name, "glibc");
        assert_eq!(n.arch, "i686");

        let n = Nevra::parse("glibc", NevraForm::Name).unwrap();
        assert!(n.has_just_name());
        assert!(Nevra::parse("glibc", NevraForm::Na).is_none());
    }

    #[test]
    fn test_parse_nevr_and_nev() {
        let n = Nevra::parse("foo-1.0-1", NevraForm::Nevr).unwrap();
        assert_eq!((n.name.as_str(), n.version.as_str(), n.release.as_str()), ("foo", "1.0", "1"));

        let n = Nevra::parse("foo-1.0", NevraForm::Nev).unwrap();
        assert_eq!((n.name.as_str(), n.version.as_str()), ("foo", "1.0"));
        assert!(Nevra::parse("foo", NevraForm::Nev).is_none());
    }

    #[test]
    fn test_arch_must_not_contain_dash() {
        assert!(Nevra::parse("foo-1.0-1", NevraForm::Na).is_none());
    }
}
