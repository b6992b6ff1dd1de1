//! HTTP verbs understood by the service API.

use std::fmt;
use std::str::FromStr;

/// Request methods issued by the client handle.
///
/// `List` is the service's custom verb for enumerating keys under a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// `GET`
    Get,
    /// `POST`
    Post,
    /// `PUT`
    Put,
    /// `DELETE`
    Delete,
    /// `LIST`
    List,
}

impl Method {
    /// Upper-case wire name of the verb.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
            Self::List => "LIST",
        }
    }

    /// Converts to the transport's method type; `None` when the verb is not a
    /// valid HTTP token.
    pub(crate) fn to_reqwest(self) -> Option<reqwest::Method> {
        match self {
            Self::Get => Some(reqwest::Method::GET),
            Self::Post => Some(reqwest::Method::POST),
            Self::Put => Some(reqwest::Method::PUT),
            Self::Delete => Some(reqwest::Method::DELETE),
            Self::List => reqwest::Method::from_bytes(self.as_str().as_bytes()).ok(),
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown verb.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported request method '{0}'")]
pub struct UnknownMethod(pub String);

impl FromStr for Method {
    type Err = UnknownMethod;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_uppercase().as_str() {
            "GET" => Ok(Self::Get),
            "POST" => Ok(Self::Post),
            "PUT" => Ok(Self::Put),
            "DELETE" => Ok(Self::Delete),
            "LIST" => Ok(Self::List),
            _ => Err(UnknownMethod(value.to_owned())),
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case::get("get", Method::Get)]
    #[case::post("POST", Method::Post)]
    #[case::list("List", Method::List)]
    fn parses_verbs_case_insensitively(#[case] text: &str, #[case] expected: Method) {
        assert_eq!(text.parse::<Method>().expect("parse"), expected);
    }

    #[test]
    fn rejects_unknown_verbs() {
        let error = "PATCH".parse::<Method>().expect_err("unsupported");
        assert_eq!(error, UnknownMethod(String::from("PATCH")));
    }

    #[test]
    fn list_maps_to_custom_wire_method() {
        let method = Method::List.to_reqwest().expect("valid token");
        assert_eq!(method.as_str(), "LIST");
    }
}
