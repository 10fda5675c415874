use nom::bytes::complete::{tag, take_while1};
use nom::sequence::terminated;
use nom::{Finish, IResult, Parser};
use nom_supreme::error::ErrorTree;
use nom_supreme::ParserExt;

pub type Res<'a, O> = IResult<&'a str, O, ErrorTree<&'a str>>;

/// run a parser to completion and keep only its output, flattening the nom
/// error tree into a message
pub fn result<'a, O>(result: Res<'a, O>) -> Result<O, String> {
    result
        .finish()
        .map(|(_, output)| output)
        .map_err(|err| err.to_string())
}

/// `<scheme>://`
pub fn scheme(input: &str) -> Res<&str> {
    terminated(
        take_while1(|c: char| c.is_ascii_alphanumeric() || c == '+' || c == '-' || c == '.'),
        tag("://"),
    )
    .context("scheme")
    .parse(input)
}

#[cfg(test)]
pub mod test {
    use crate::parse::util::{result, scheme};

    #[test]
    pub fn scheme_split() {
        assert_eq!(scheme("redb://data/x").unwrap(), ("data/x", "redb"));
        assert_eq!(scheme("mcp://").unwrap(), ("", "mcp"));
        assert!(scheme("redb:/data").is_err());
        assert!(scheme("://data").is_err());
        assert!(result(scheme("no scheme here")).is_err());
    }
}
