use edkarma_core::ContributionId;
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
pub struct ScoresQuery {
    pub posts: Option<String>,
    pub replies: Option<String>,
}

/// Parses a comma-separated id list. `None` means the list was not
/// requested at all.
pub fn parse_ids(csv: Option<&str>) -> Result<Option<Vec<ContributionId>>, std::num::ParseIntError> {
    let Some(csv) = csv.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(None);
    };
    csv.split(',')
        .map(|s| s.trim().parse::<ContributionId>())
        .collect::<Result<Vec<_>, _>>()
        .map(Some)
}

#[cfg(test)]
mod tests {
    use super::parse_ids;

    #[test]
    fn parses_lists() {
        assert_eq!(parse_ids(Some("1,2, 3")).unwrap(), Some(vec![1, 2, 3]));
        assert_eq!(parse_ids(Some("")).unwrap(), None);
        assert_eq!(parse_ids(None).unwrap(), None);
        assert!(parse_ids(Some("1,x")).is_err());
    }
}
