use std::str::FromStr;

use anyhow::{Error, Result, bail};

/// Census edition covered by the IBGE mesh servers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Censo {
    Censo2010,
    Censo2022,
}

impl Censo {
    /// Reference year, as used in cache paths and log lines.
    #[inline]
    pub fn year(&self) -> u16 {
        match self {
            Censo::Censo2010 => 2010,
            Censo::Censo2022 => 2022,
        }
    }
}

impl TryFrom<u16> for Censo {
    type Error = Error;

    fn try_from(year: u16) -> Result<Self> {
        match year {
            2010 => Ok(Censo::Censo2010),
            2022 => Ok(Censo::Censo2022),
            _ => bail!("unsupported census year: {year} (expected 2010 or 2022)"),
        }
    }
}

/// Geographic level of a census mesh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Nivel {
    Distritos, // District subdivisions of municipalities
    Setores,   // Enumeration sectors, the finest level IBGE publishes
}

impl Nivel {
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            Nivel::Distritos => "distritos",
            Nivel::Setores => "setores",
        }
    }
}

impl FromStr for Nivel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "distritos" => Ok(Nivel::Distritos),
            "setores" => Ok(Nivel::Setores),
            _ => bail!("unsupported mesh level: {s:?} (expected distritos or setores)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn censo_from_year() {
        assert_eq!(Censo::try_from(2010).unwrap(), Censo::Censo2010);
        assert_eq!(Censo::try_from(2022).unwrap(), Censo::Censo2022);
        assert!(Censo::try_from(2000).is_err());
    }

    #[test]
    fn nivel_from_str() {
        assert_eq!("setores".parse::<Nivel>().unwrap(), Nivel::Setores);
        assert_eq!("Distritos".parse::<Nivel>().unwrap(), Nivel::Distritos);
        assert!("municipios".parse::<Nivel>().is_err());
    }
}
