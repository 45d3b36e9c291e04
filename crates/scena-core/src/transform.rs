//! CSS transform function lists.
//!
//! A frame's `transform` property is kept parsed so gestures can compose onto
//! it structurally (translate in front, rotate after the leading translation,
//! scale at the end) instead of overwriting text. Parsing is built on
//! `winnow` 0.7; emission is canonical CSS.

use crate::error::{Result, SceneError};
use crate::matrix::{Matrix4, format_number};
use kurbo::{Size, Vec2};
use smallvec::SmallVec;
use winnow::error::{ContextError, ErrMode};
use winnow::prelude::*;
use winnow::token::take_while;

/// A length that may depend on the element's own size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Length {
    Px(f64),
    Percent(f64),
}

impl Length {
    pub fn resolve(self, basis: f64) -> f64 {
        match self {
            Length::Px(v) => v,
            Length::Percent(p) => basis * p / 100.0,
        }
    }

    fn to_css(self) -> String {
        match self {
            Length::Px(v) => format!("{}px", format_number(v)),
            Length::Percent(p) => format!("{}%", format_number(p)),
        }
    }
}

/// One function of a CSS transform list. Angles are in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TransformFn {
    Translate(Length, Length),
    Translate3d(Length, Length, f64),
    Scale(f64, f64),
    Rotate(f64),
    Skew(f64, f64),
    Matrix([f64; 6]),
    Matrix3d([f64; 16]),
}

impl TransformFn {
    pub fn to_matrix(&self, size: Size) -> Matrix4 {
        match *self {
            TransformFn::Translate(x, y) => {
                Matrix4::translation(x.resolve(size.width), y.resolve(size.height), 0.0)
            }
            TransformFn::Translate3d(x, y, z) => {
                Matrix4::translation(x.resolve(size.width), y.resolve(size.height), z)
            }
            TransformFn::Scale(sx, sy) => Matrix4::scale(sx, sy, 1.0),
            TransformFn::Rotate(deg) => Matrix4::rotation_z(deg),
            TransformFn::Skew(ax, ay) => Matrix4::skew(ax, ay),
            TransformFn::Matrix(c) => Matrix4::from_2d(c),
            TransformFn::Matrix3d(m) => Matrix4::from_cols_array(m),
        }
    }

    pub fn to_css(&self) -> String {
        match *self {
            TransformFn::Translate(x, y) => format!("translate({}, {})", x.to_css(), y.to_css()),
            TransformFn::Translate3d(x, y, z) => format!(
                "translate3d({}, {}, {}px)",
                x.to_css(),
                y.to_css(),
                format_number(z)
            ),
            TransformFn::Scale(sx, sy) => {
                format!("scale({}, {})", format_number(sx), format_number(sy))
            }
            TransformFn::Rotate(deg) => format!("rotate({}deg)", format_number(deg)),
            TransformFn::Skew(ax, ay) => {
                format!("skew({}deg, {}deg)", format_number(ax), format_number(ay))
            }
            TransformFn::Matrix(c) => Matrix4::from_2d(c).to_css(),
            TransformFn::Matrix3d(m) => {
                let values: Vec<String> = m.iter().map(|v| format_number(*v)).collect();
                format!("matrix3d({})", values.join(", "))
            }
        }
    }

    fn is_translation(&self) -> bool {
        matches!(
            self,
            TransformFn::Translate(..) | TransformFn::Translate3d(..)
        )
    }
}

/// An ordered transform list. Empty means `none`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Transform {
    pub fns: SmallVec<[TransformFn; 4]>,
}

impl Transform {
    pub fn parse(input: &str) -> Result<Self> {
        parse_transform(input)
    }

    pub fn is_none(&self) -> bool {
        self.fns.is_empty()
    }

    /// Compose the list left to right into one matrix.
    pub fn to_matrix(&self, size: Size) -> Matrix4 {
        self.fns
            .iter()
            .fold(Matrix4::IDENTITY, |acc, f| acc * f.to_matrix(size))
    }

    pub fn to_css(&self) -> String {
        if self.fns.is_empty() {
            return "none".to_string();
        }
        self.fns
            .iter()
            .map(TransformFn::to_css)
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Pre-multiply a translation (parent-space move).
    pub fn prepend_translate(&mut self, delta: Vec2) {
        if delta.x == 0.0 && delta.y == 0.0 {
            return;
        }
        if let Some(TransformFn::Translate(Length::Px(x), Length::Px(y))) = self.fns.first_mut() {
            *x += delta.x;
            *y += delta.y;
            return;
        }
        self.fns.insert(
            0,
            TransformFn::Translate(Length::Px(delta.x), Length::Px(delta.y)),
        );
    }

    /// Rotate about the transform origin, right after the leading
    /// translations so the visual turns by exactly `degrees` whatever
    /// scale or skew follows.
    pub fn rotate_by(&mut self, degrees: f64) {
        if degrees == 0.0 {
            return;
        }
        let at = self
            .fns
            .iter()
            .position(|f| !f.is_translation())
            .unwrap_or(self.fns.len());
        if let Some(TransformFn::Rotate(current)) = self.fns.get_mut(at) {
            *current += degrees;
            return;
        }
        self.fns.insert(at, TransformFn::Rotate(degrees));
    }

    /// Post-multiply a scale (element-local axes).
    pub fn scale_by(&mut self, sx: f64, sy: f64) {
        if sx == 1.0 && sy == 1.0 {
            return;
        }
        if let Some(TransformFn::Scale(x, y)) = self.fns.last_mut() {
            *x *= sx;
            *y *= sy;
            return;
        }
        self.fns.push(TransformFn::Scale(sx, sy));
    }

    /// Replace the whole list with a single matrix.
    pub fn set_matrix(&mut self, matrix: &Matrix4) {
        self.fns.clear();
        match matrix.to_2d() {
            Some(c) => self.fns.push(TransformFn::Matrix(c)),
            None => self.fns.push(TransformFn::Matrix3d(matrix.m)),
        }
    }
}

// ─── Parser ───────────────────────────────────────────────────────────────

/// Parse CSS transform text (`translate(-125px, -100px) rotate(30deg)`).
pub fn parse_transform(input: &str) -> Result<Transform> {
    let trimmed = input.trim();
    let mut transform = Transform::default();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("none") {
        return Ok(transform);
    }

    let fail = |reason: String| SceneError::Transform {
        input: input.to_string(),
        reason,
    };

    let mut rest = trimmed;
    loop {
        skip_space(&mut rest);
        if rest.is_empty() {
            break;
        }
        let (name, args) = parse_function
            .parse_next(&mut rest)
            .map_err(|e| fail(format!("syntax error near `{rest}`: {e}")))?;
        let function = build_function(&name.to_ascii_lowercase(), &args).map_err(fail)?;
        transform.fns.push(function);
    }
    Ok(transform)
}

type Args<'a> = SmallVec<[(f64, &'a str); 6]>;

fn skip_space(input: &mut &str) {
    use winnow::ascii::multispace0;
    let _: Result<&str, ErrMode<ContextError>> = multispace0.parse_next(input);
}

fn parse_function<'a>(input: &mut &'a str) -> ModalResult<(&'a str, Args<'a>)> {
    let name = take_while(1.., |c: char| c.is_ascii_alphanumeric()).parse_next(input)?;
    skip_space(input);
    let _ = '('.parse_next(input)?;
    let mut args = Args::new();
    loop {
        skip_space(input);
        if input.starts_with(')') {
            break;
        }
        args.push(parse_arg(input)?);
        skip_space(input);
        if input.starts_with(',') {
            *input = &input[1..];
        }
    }
    let _ = ')'.parse_next(input)?;
    Ok((name, args))
}

fn parse_arg<'a>(input: &mut &'a str) -> ModalResult<(f64, &'a str)> {
    let value = parse_number(input)?;
    let unit = take_while(0.., |c: char| c.is_ascii_alphabetic() || c == '%').parse_next(input)?;
    Ok((value, unit))
}

fn parse_number(input: &mut &str) -> ModalResult<f64> {
    let start = *input;
    if input.starts_with('-') || input.starts_with('+') {
        *input = &input[1..];
    }
    let int_digits = input.len() - input.trim_start_matches(|c: char| c.is_ascii_digit()).len();
    *input = &input[int_digits..];
    let mut frac_digits = 0;
    if input.starts_with('.') {
        let after = &input[1..];
        frac_digits = after.len() - after.trim_start_matches(|c: char| c.is_ascii_digit()).len();
        *input = &after[frac_digits..];
    }
    if int_digits + frac_digits == 0 {
        *input = start;
        return Err(ErrMode::Backtrack(ContextError::new()));
    }
    // Exponent only when digits follow, so `1em` keeps its unit.
    let bytes = input.as_bytes();
    if matches!(bytes.first(), Some(b'e' | b'E')) {
        let mut i = 1;
        if matches!(bytes.get(1), Some(b'-' | b'+')) {
            i = 2;
        }
        if bytes.get(i).is_some_and(u8::is_ascii_digit) {
            let rest = &input[i..];
            let digits = rest.len() - rest.trim_start_matches(|c: char| c.is_ascii_digit()).len();
            *input = &input[i + digits..];
        }
    }
    let matched = &start[..start.len() - input.len()];
    matched
        .parse::<f64>()
        .map_err(|_| ErrMode::Backtrack(ContextError::new()))
}

fn length(arg: (f64, &str)) -> std::result::Result<Length, String> {
    match arg.1 {
        "px" => Ok(Length::Px(arg.0)),
        "%" => Ok(Length::Percent(arg.0)),
        "" if arg.0 == 0.0 => Ok(Length::Px(0.0)),
        unit => Err(format!("unsupported length unit `{unit}`")),
    }
}

fn angle(arg: (f64, &str)) -> std::result::Result<f64, String> {
    match arg.1 {
        "deg" => Ok(arg.0),
        "rad" => Ok(arg.0.to_degrees()),
        "grad" => Ok(arg.0 * 0.9),
        "turn" => Ok(arg.0 * 360.0),
        "" if arg.0 == 0.0 => Ok(0.0),
        unit => Err(format!("unsupported angle unit `{unit}`")),
    }
}

fn number(arg: (f64, &str)) -> std::result::Result<f64, String> {
    if arg.1.is_empty() {
        Ok(arg.0)
    } else {
        Err(format!("expected a plain number, found unit `{}`", arg.1))
    }
}

fn build_function(name: &str, args: &[(f64, &str)]) -> std::result::Result<TransformFn, String> {
    let arity = |range: std::ops::RangeInclusive<usize>| {
        if range.contains(&args.len()) {
            Ok(())
        } else {
            Err(format!("`{name}` takes {range:?} arguments, got {}", args.len()))
        }
    };
    let zero = Length::Px(0.0);

    match name {
        "translate" => {
            arity(1..=2)?;
            let x = length(args[0])?;
            let y = args.get(1).copied().map(length).transpose()?.unwrap_or(zero);
            Ok(TransformFn::Translate(x, y))
        }
        "translatex" => {
            arity(1..=1)?;
            Ok(TransformFn::Translate(length(args[0])?, zero))
        }
        "translatey" => {
            arity(1..=1)?;
            Ok(TransformFn::Translate(zero, length(args[0])?))
        }
        "translate3d" => {
            arity(3..=3)?;
            let z = match length(args[2])? {
                Length::Px(z) => z,
                Length::Percent(_) => return Err("translate3d z cannot be a percentage".into()),
            };
            Ok(TransformFn::Translate3d(length(args[0])?, length(args[1])?, z))
        }
        "scale" => {
            arity(1..=2)?;
            let sx = number(args[0])?;
            let sy = args.get(1).copied().map(number).transpose()?.unwrap_or(sx);
            Ok(TransformFn::Scale(sx, sy))
        }
        "scalex" => {
            arity(1..=1)?;
            Ok(TransformFn::Scale(number(args[0])?, 1.0))
        }
        "scaley" => {
            arity(1..=1)?;
            Ok(TransformFn::Scale(1.0, number(args[0])?))
        }
        "rotate" | "rotatez" => {
            arity(1..=1)?;
            Ok(TransformFn::Rotate(angle(args[0])?))
        }
        "skew" => {
            arity(1..=2)?;
            let ax = angle(args[0])?;
            let ay = args.get(1).copied().map(angle).transpose()?.unwrap_or(0.0);
            Ok(TransformFn::Skew(ax, ay))
        }
        "skewx" => {
            arity(1..=1)?;
            Ok(TransformFn::Skew(angle(args[0])?, 0.0))
        }
        "skewy" => {
            arity(1..=1)?;
            Ok(TransformFn::Skew(0.0, angle(args[0])?))
        }
        "matrix" => {
            arity(6..=6)?;
            let mut c = [0.0; 6];
            for (slot, arg) in c.iter_mut().zip(args) {
                *slot = number(*arg)?;
            }
            Ok(TransformFn::Matrix(c))
        }
        "matrix3d" => {
            arity(16..=16)?;
            let mut m = [0.0; 16];
            for (slot, arg) in m.iter_mut().zip(args) {
                *slot = number(*arg)?;
            }
            Ok(TransformFn::Matrix3d(m))
        }
        other => Err(format!("unknown transform function `{other}`")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kurbo::Point;

    #[test]
    fn parses_translate_pair() {
        let t = Transform::parse("translate(-125px, -100px)").unwrap();
        assert_eq!(
            t.fns.as_slice(),
            &[TransformFn::Translate(Length::Px(-125.0), Length::Px(-100.0))]
        );
        assert_eq!(t.to_css(), "translate(-125px, -100px)");
    }

    #[test]
    fn parses_function_list_and_units() {
        let t = Transform::parse("translateX(50%) rotate(0.25turn) scale(2) skewY(10deg)").unwrap();
        assert_eq!(t.fns.len(), 4);
        assert_eq!(
            t.fns[0],
            TransformFn::Translate(Length::Percent(50.0), Length::Px(0.0))
        );
        assert_eq!(t.fns[1], TransformFn::Rotate(90.0));
        assert_eq!(t.fns[2], TransformFn::Scale(2.0, 2.0));
        assert_eq!(t.fns[3], TransformFn::Skew(0.0, 10.0));
    }

    #[test]
    fn none_and_empty_are_identity() {
        assert!(Transform::parse("none").unwrap().is_none());
        assert!(Transform::parse("   ").unwrap().is_none());
        assert_eq!(Transform::default().to_css(), "none");
    }

    #[test]
    fn rejects_unknown_function() {
        let err = Transform::parse("wobble(3px)").unwrap_err();
        assert!(matches!(err, SceneError::Transform { .. }), "{err}");
    }

    #[test]
    fn rejects_unsupported_unit() {
        assert!(Transform::parse("translate(2em, 0)").is_err());
    }

    #[test]
    fn exponent_numbers() {
        let t = Transform::parse("translate(1e2px, -2.5e-1px)").unwrap();
        assert_eq!(
            t.fns[0],
            TransformFn::Translate(Length::Px(100.0), Length::Px(-0.25))
        );
    }

    #[test]
    fn percent_translate_resolves_against_size() {
        let t = Transform::parse("translate(-50%, -50%)").unwrap();
        let p = t
            .to_matrix(Size::new(200.0, 100.0))
            .transform_point(Point::ZERO);
        assert_eq!(p, Point::new(-100.0, -50.0));
    }

    #[test]
    fn prepend_translate_accumulates() {
        let mut t = Transform::parse("rotate(45deg)").unwrap();
        t.prepend_translate(Vec2::new(10.0, 20.0));
        t.prepend_translate(Vec2::new(5.0, 0.0));
        assert_eq!(t.to_css(), "translate(15px, 20px) rotate(45deg)");
        t.prepend_translate(Vec2::ZERO);
        assert_eq!(t.fns.len(), 2);
    }

    #[test]
    fn rotate_lands_after_translation() {
        let mut t = Transform::parse("translate(10px, 0px) scale(2, 1)").unwrap();
        t.rotate_by(30.0);
        t.rotate_by(15.0);
        assert_eq!(
            t.to_css(),
            "translate(10px, 0px) rotate(45deg) scale(2, 1)"
        );
    }

    #[test]
    fn scale_accumulates_at_end() {
        let mut t = Transform::default();
        t.scale_by(2.0, 1.0);
        t.scale_by(1.5, 3.0);
        assert_eq!(t.fns.as_slice(), &[TransformFn::Scale(3.0, 3.0)]);
        t.scale_by(1.0, 1.0);
        assert_eq!(t.fns.len(), 1);
    }

    #[test]
    fn set_matrix_replaces_list() {
        let mut t = Transform::parse("translate(1px, 2px) rotate(3deg)").unwrap();
        t.set_matrix(&Matrix4::translation(7.0, 8.0, 0.0));
        assert_eq!(t.to_css(), "matrix(1, 0, 0, 1, 7, 8)");
        let reparsed = Transform::parse(&t.to_css()).unwrap();
        assert_eq!(reparsed, t);
    }
}
