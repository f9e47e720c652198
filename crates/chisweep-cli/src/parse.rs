use crate::error::CliError;

/// Splits a `KEY=VAL[,KEY=VAL…]` list into pairs.
pub fn parse_key_value_list(raw: &str) -> Result<Vec<(String, String)>, CliError> {
    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.split_once('=')
                .map(|(key, value)| (key.trim().to_string(), value.trim().to_string()))
                .filter(|(key, _)| !key.is_empty())
                .ok_or_else(|| {
                    CliError::Config(format!(
                        "invalid parameter '{part}'; expected KEY=VAL"
                    ))
                })
        })
        .collect()
}

/// Parses a comma-separated angle list given in degrees into radians.
pub fn parse_angle_list_degrees(raw: &str) -> Result<Vec<f64>, CliError> {
    let values: Vec<f64> = raw
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse::<f64>()
                .map(f64::to_radians)
                .map_err(|_| CliError::Config(format!("invalid angle '{part}'; expected degrees")))
        })
        .collect::<Result<_, _>>()?;
    if values.is_empty() {
        return Err(CliError::Config(
            "angle list must contain at least one value".to_string(),
        ));
    }
    Ok(values)
}

/// Parses a residue selector list of the form `CHAIN/SEQ[,CHAIN/SEQ…]`.
pub fn parse_residue_list(raw: &str) -> Result<Vec<(String, isize)>, CliError> {
    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            let (chain, seq) = part.split_once('/').ok_or_else(|| {
                CliError::Config(format!(
                    "invalid residue selector '{part}'; expected CHAIN/SEQ"
                ))
            })?;
            let seq: isize = seq.trim().parse().map_err(|_| {
                CliError::Config(format!("invalid residue number in selector '{part}'"))
            })?;
            Ok((chain.trim().to_string(), seq))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    #[test]
    fn key_value_lists_split_on_commas_and_equals() {
        let pairs = parse_key_value_list("lj_k=2.0, cutoff_start = 2.0").unwrap();
        assert_eq!(
            pairs,
            vec![
                ("lj_k".to_string(), "2.0".to_string()),
                ("cutoff_start".to_string(), "2.0".to_string()),
            ]
        );
    }

    #[test]
    fn key_value_lists_reject_entries_without_equals() {
        assert!(matches!(
            parse_key_value_list("lj_k"),
            Err(CliError::Config(_))
        ));
        assert!(matches!(
            parse_key_value_list("=1.0"),
            Err(CliError::Config(_))
        ));
    }

    #[test]
    fn angle_lists_convert_degrees_to_radians() {
        let angles = parse_angle_list_degrees("0, 90, 180").unwrap();
        assert_eq!(angles.len(), 3);
        assert!((angles[1] - PI / 2.0).abs() < 1e-12);
        assert!((angles[2] - PI).abs() < 1e-12);
    }

    #[test]
    fn empty_angle_lists_are_rejected() {
        assert!(matches!(
            parse_angle_list_degrees(" , "),
            Err(CliError::Config(_))
        ));
        assert!(matches!(
            parse_angle_list_degrees("ninety"),
            Err(CliError::Config(_))
        ));
    }

    #[test]
    fn residue_selectors_parse_chain_and_number() {
        let residues = parse_residue_list("A/15, B/7").unwrap();
        assert_eq!(
            residues,
            vec![("A".to_string(), 15), ("B".to_string(), 7)]
        );
        assert!(matches!(
            parse_residue_list("A15"),
            Err(CliError::Config(_))
        ));
    }
}
