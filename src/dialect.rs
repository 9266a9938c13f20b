//! SQL dialects and the mapping from abstract column types to dialect type
//! names.
//!
//! Every mapping function is a `match` over [`Dialect`], so adding a dialect
//! forces a decision at each type. Unknown dialect tokens resolve to
//! [`Dialect::Generic`] in [`Dialect::from_token`].

use std::{fmt, str::FromStr};

use log::warn;
use serde::{Deserialize, Serialize};

pub const DEFAULT_DECIMAL_PRECISION: u32 = 18;

const SMALL_INTEGER_LIMIT: f64 = 32767.0;
const MEDIUM_INTEGER_LIMIT: f64 = 2147483647.0;

const POSTGRES_VARCHAR_LIMIT: usize = 255;
const MYSQL_VARCHAR_LIMIT: usize = 16383;
const MYSQL_MEDIUMTEXT_LIMIT: usize = 65535;
const SQLSERVER_VARCHAR_LIMIT: usize = 8000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    Generic,
    MySql,
    PostgreSql,
    Sqlite,
    SqlServer,
}

impl Dialect {
    /// Resolves a user-supplied token. Unrecognized tokens fall back to
    /// [`Dialect::Generic`] instead of failing.
    pub fn from_token(token: &str) -> Self {
        match token.trim().to_ascii_lowercase().as_str() {
            "mysql" | "mariadb" => Dialect::MySql,
            "postgresql" | "postgres" | "pg" => Dialect::PostgreSql,
            "sqlite" | "sqlite3" => Dialect::Sqlite,
            "sqlserver" | "mssql" | "tsql" => Dialect::SqlServer,
            "generic" | "" => Dialect::Generic,
            other => {
                warn!("Unrecognized dialect '{other}', using generic SQL types");
                Dialect::Generic
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Dialect::Generic => "generic",
            Dialect::MySql => "mysql",
            Dialect::PostgreSql => "postgresql",
            Dialect::Sqlite => "sqlite",
            Dialect::SqlServer => "sqlserver",
        }
    }

    /// SQL type for integer columns whose largest value is `max_value`.
    pub fn integer_type(&self, max_value: f64) -> &'static str {
        self.integer_type_for(IntegerWidth::for_max_value(max_value))
    }

    pub fn integer_type_for(&self, width: IntegerWidth) -> &'static str {
        match (self, width) {
            (Dialect::MySql | Dialect::SqlServer, IntegerWidth::Small) => "SMALLINT",
            (Dialect::MySql | Dialect::SqlServer, IntegerWidth::Medium) => "INT",
            (Dialect::MySql | Dialect::SqlServer, IntegerWidth::Big) => "BIGINT",
            (Dialect::PostgreSql, IntegerWidth::Small) => "SMALLINT",
            (Dialect::PostgreSql, IntegerWidth::Medium) => "INTEGER",
            (Dialect::PostgreSql, IntegerWidth::Big) => "BIGINT",
            (Dialect::Sqlite | Dialect::Generic, _) => "INTEGER",
        }
    }

    /// Fixed-point type. `scale` is clamped to `precision`.
    pub fn decimal_type(&self, precision: u32, scale: u32) -> String {
        let scale = scale.min(precision);
        match self {
            Dialect::PostgreSql => format!("NUMERIC({precision},{scale})"),
            Dialect::MySql | Dialect::SqlServer | Dialect::Sqlite | Dialect::Generic => {
                format!("DECIMAL({precision},{scale})")
            }
        }
    }

    pub fn varchar_type(&self, length: usize) -> String {
        match self {
            Dialect::PostgreSql if length > POSTGRES_VARCHAR_LIMIT => "TEXT".to_string(),
            Dialect::MySql if length > MYSQL_MEDIUMTEXT_LIMIT => "LONGTEXT".to_string(),
            Dialect::MySql if length > MYSQL_VARCHAR_LIMIT => "MEDIUMTEXT".to_string(),
            Dialect::SqlServer if length > SQLSERVER_VARCHAR_LIMIT => "VARCHAR(MAX)".to_string(),
            Dialect::PostgreSql
            | Dialect::MySql
            | Dialect::SqlServer
            | Dialect::Sqlite
            | Dialect::Generic => format!("VARCHAR({length})"),
        }
    }

    pub fn date_type(&self) -> &'static str {
        match self {
            Dialect::MySql | Dialect::Sqlite => "DATETIME",
            Dialect::SqlServer => "DATETIME2",
            Dialect::PostgreSql | Dialect::Generic => "TIMESTAMP",
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Dialect {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Dialect::from_token(s))
    }
}

/// Width class used to pick a concrete integer type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntegerWidth {
    Small,
    Medium,
    Big,
}

impl IntegerWidth {
    pub fn for_max_value(max_value: f64) -> Self {
        if max_value < SMALL_INTEGER_LIMIT {
            IntegerWidth::Small
        } else if max_value < MEDIUM_INTEGER_LIMIT {
            IntegerWidth::Medium
        } else {
            IntegerWidth::Big
        }
    }
}
