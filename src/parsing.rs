use nom::{
    bytes::complete::take_while1,
    character::complete::{char, space0, space1},
    multi::{many0, separated_list0},
    number::complete::double,
    sequence::{delimited, preceded, terminated},
    IResult,
};

pub(crate) fn non_space(line: &str) -> IResult<&str, &str> {
    take_while1(|c: char| !c.is_ascii_whitespace())(line)
}

/// All numbers in a line of whitespace-separated values
pub(crate) fn values(line: &str) -> IResult<&str, Vec<f64>> {
    delimited(space0, separated_list0(space1, double), space0)(line)
}

/// Labels from a header line like `# x y z`
pub(crate) fn labels(line: &str) -> IResult<&str, Vec<&str>> {
    terminated(
        preceded(char('#'), many0(preceded(space1, non_space))),
        space0,
    )(line)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_values() {
        assert_eq!(values("1.0 -2.5\t3e2 "), Ok(("", vec![1., -2.5, 300.])));
        assert_eq!(values(""), Ok(("", vec![])));
        let (rest, vals) = values("1.0 abc").unwrap();
        assert_eq!(vals, [1.]);
        assert_eq!(rest, "abc");
        let (rest, vals) = values("1.5-2").unwrap();
        assert_eq!(vals, [1.5]);
        assert_eq!(rest, "-2");
    }

    #[test]
    fn parse_labels() {
        assert_eq!(labels("# x y_1 z"), Ok(("", vec!["x", "y_1", "z"])));
        assert_eq!(labels("#"), Ok(("", vec![])));
        assert!(labels("x y").is_err());
    }
}
