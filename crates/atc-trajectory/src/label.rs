//! Colon-separated text labels for [`TcpMeta`], used at serialization boundaries.
//!
//! A non-empty label starts and ends with `:`, e.g. `:BOT:ATRK:1500:CTR:10_20_0:LIDX:3:`.
//! Positions are their components joined by `_`. The free-text `info` field is
//! not encoded.

use crate::geometry::Coordinate;
use crate::tcp::{GsTag, Source, TcpMeta, TrkTag, VsTag, WayKind};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LabelError {
    #[error("unknown label token '{0}'")]
    UnknownToken(String),

    #[error("token {0} is missing its value")]
    MissingValue(&'static str),

    #[error("bad value '{value}' for {token}")]
    BadValue { token: &'static str, value: String },
}

fn position<P: Coordinate>(p: &P) -> String {
    let c = p.components();
    format!("{}_{}_{}", c[0], c[1], c[2])
}

/// Encode every field of `meta` except `info`.
pub fn encode<P: Coordinate>(meta: &TcpMeta<P>) -> String {
    let mut tokens: Vec<String> = Vec::new();
    match meta.kind {
        WayKind::Original => {}
        WayKind::Virtual => tokens.push("VIRT".into()),
        WayKind::AltitudePreserve => tokens.push("ALTP".into()),
    }
    if !meta.trk.is_none() {
        tokens.push(meta.trk.label().into());
    }
    if meta.signed_radius != 0.0 {
        tokens.push(format!("ATRK:{}", meta.signed_radius));
    }
    if let Some(center) = &meta.turn_center {
        tokens.push(format!("CTR:{}", position(center)));
    }
    if !meta.gs.is_none() {
        tokens.push(meta.gs.label().into());
    }
    if meta.gs_accel != 0.0 {
        tokens.push(format!("AGS:{}", meta.gs_accel));
    }
    if !meta.vs.is_none() {
        tokens.push(meta.vs.label().into());
    }
    if meta.vs_accel != 0.0 {
        tokens.push(format!("AVS:{}", meta.vs_accel));
    }
    match &meta.source {
        Some(src) => tokens.push(format!("SRC:{}:STM:{}", position(&src.position), src.time)),
        None if meta.is_tcp() => tokens.push("ADDED".into()),
        None => {}
    }
    if let Some(ix) = meta.linear_index {
        tokens.push(format!("LIDX:{ix}"));
    }

    if tokens.is_empty() {
        String::new()
    } else {
        format!(":{}:", tokens.join(":"))
    }
}

/// Parse a label produced by [`encode`]. Unknown tokens are rejected.
pub fn decode<P: Coordinate>(label: &str) -> Result<TcpMeta<P>, LabelError> {
    let mut meta = TcpMeta::new();
    let mut tokens = label.split(':').filter(|s| !s.is_empty());

    while let Some(token) = tokens.next() {
        match token {
            "VIRT" => meta.kind = WayKind::Virtual,
            "ALTP" => meta.kind = WayKind::AltitudePreserve,
            "ATRK" => meta.signed_radius = number(tokens.next(), "ATRK")?,
            "CTR" => meta.turn_center = Some(parse_position(tokens.next(), "CTR")?),
            "AGS" => meta.gs_accel = number(tokens.next(), "AGS")?,
            "AVS" => meta.vs_accel = number(tokens.next(), "AVS")?,
            "SRC" => {
                let position = parse_position(tokens.next(), "SRC")?;
                match tokens.next() {
                    Some("STM") => {}
                    Some(other) => {
                        return Err(LabelError::BadValue { token: "SRC", value: other.into() })
                    }
                    None => return Err(LabelError::MissingValue("STM")),
                }
                let time = number(tokens.next(), "STM")?;
                meta.source = Some(Source { position, time });
            }
            "ADDED" => {}
            "LIDX" => {
                let value = tokens.next().ok_or(LabelError::MissingValue("LIDX"))?;
                meta.linear_index = Some(value.parse().map_err(|_| LabelError::BadValue {
                    token: "LIDX",
                    value: value.into(),
                })?);
            }
            other => {
                if let Some(tag) = TrkTag::from_label(other) {
                    meta.trk = tag;
                } else if let Some(tag) = GsTag::from_label(other) {
                    meta.gs = tag;
                } else if let Some(tag) = VsTag::from_label(other) {
                    meta.vs = tag;
                } else {
                    return Err(LabelError::UnknownToken(other.into()));
                }
            }
        }
    }
    Ok(meta)
}

fn number(value: Option<&str>, token: &'static str) -> Result<f64, LabelError> {
    let value = value.ok_or(LabelError::MissingValue(token))?;
    value
        .parse()
        .map_err(|_| LabelError::BadValue { token, value: value.into() })
}

fn parse_position<P: Coordinate>(value: Option<&str>, token: &'static str) -> Result<P, LabelError> {
    let value = value.ok_or(LabelError::MissingValue(token))?;
    let bad = || LabelError::BadValue { token, value: value.into() };
    let parts: Vec<f64> = value
        .split('_')
        .map(|s| s.parse::<f64>())
        .collect::<Result<_, _>>()
        .map_err(|_| bad())?;
    match parts.as_slice() {
        [a, b, c] => Ok(P::from_components([*a, *b, *c])),
        _ => Err(bad()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{LatLonAlt, Xyz};

    #[test]
    fn test_plain_vertex_has_empty_label() {
        assert_eq!(encode(&TcpMeta::<Xyz>::new()), "");
        assert_eq!(decode::<Xyz>("").unwrap(), TcpMeta::new());
    }

    #[test]
    fn test_bot_label() {
        let mut meta = TcpMeta::new().with_linear_index(3);
        meta.set_bot(-1500.0, Xyz::new(10.0, 20.5, 0.0));
        let label = encode(&meta);
        assert_eq!(label, ":BOT:ATRK:-1500:CTR:10_20.5_0:ADDED:LIDX:3:");
        assert_eq!(decode::<Xyz>(&label).unwrap(), meta);
    }

    #[test]
    fn test_decode_drops_info_only() {
        let mut meta = TcpMeta::new()
            .with_source(LatLonAlt::new(0.7, -1.2, 3000.0), 125.25)
            .with_info("runway 27");
        meta.set_egs();
        meta.set_bgs(-0.75);
        meta.set_bvs(0.5);
        meta.set_alt_preserve();
        let decoded: TcpMeta<LatLonAlt> = decode(&encode(&meta)).unwrap();
        assert!(decoded.gs.is_begin() && decoded.gs.is_end());
        meta.info.clear();
        assert_eq!(decoded, meta);
    }

    #[test]
    fn test_bad_labels() {
        assert_eq!(
            decode::<Xyz>(":FOO:"),
            Err(LabelError::UnknownToken("FOO".into()))
        );
        assert_eq!(decode::<Xyz>(":ATRK:"), Err(LabelError::MissingValue("ATRK")));
        assert!(matches!(
            decode::<Xyz>(":CTR:1_2:"),
            Err(LabelError::BadValue { token: "CTR", .. })
        ));
    }
}
