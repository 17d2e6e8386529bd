//! Text command scripts: one turtle command per line.
//!
//! A line is an operation name followed by its arguments. Operation names
//! are the snake_case command names (`forward 2`, `blend_contours 1 2 0.5`)
//! or the classic single-character turtle symbols:
//!
//! | symbol | command                 | symbol | command               |
//! |--------|-------------------------|--------|-----------------------|
//! | `F`    | forward `[d=1]`         | `f`    | move `[d=1]`          |
//! | `+`    | turn `a`                | `-`    | turn `-a`             |
//! | `&`    | pitch `a`               | `^`    | pitch `-a`            |
//! | `/`    | roll `a`                | `\`    | roll `-a`             |
//! | `\|`   | turn around             | `$`    | roll to horizontal    |
//! | `[`    | push                    | `]`    | pop                   |
//! | `!`    | set width `w`           | `;`    | set color `i`         |
//! | `{`    | start polygon           | `}`    | end polygon           |
//! | `.`    | polygon point           | `@o`   | circle `d`            |
//! | `@Gs`  | start cylinder          | `@Gc`  | cylinder point        |
//! | `@Ge`  | end cylinder            | `~`    | surface `id [s=1]`    |
//!
//! Optional arguments may be written as `-` or `none` to clear an override,
//! e.g. `set_texture none`.

use super::{content_lines, token};
use crate::render::TurtleCommand;

#[derive(Debug, thiserror::Error)]
pub enum ScriptError {
    #[error("script line {line}: unknown command `{op}`")]
    UnknownCommand { line: usize, op: String },
    #[error("script line {line}: `{op}` expects {expected}, got {got} argument(s)")]
    Arity { line: usize, op: String, expected: &'static str, got: usize },
    #[error("script line {line}: {message}")]
    Argument { line: usize, message: String },
}

/// Positional arguments of one line.
struct Args<'a> {
    line: usize,
    op: &'a str,
    values: Vec<&'a str>,
}

impl Args<'_> {
    fn arity(&self, expected: &'static str, range: std::ops::RangeInclusive<usize>) -> Result<(), ScriptError> {
        if range.contains(&self.values.len()) {
            Ok(())
        } else {
            Err(ScriptError::Arity {
                line: self.line,
                op: self.op.to_owned(),
                expected,
                got: self.values.len(),
            })
        }
    }

    fn get<T: std::str::FromStr>(&self, index: usize, what: &str) -> Result<T, ScriptError> {
        let value = self.values.get(index).copied().unwrap_or_default();
        token(value, what).map_err(|message| ScriptError::Argument { line: self.line, message })
    }

    fn get_or<T: std::str::FromStr>(&self, index: usize, what: &str, default: T) -> Result<T, ScriptError> {
        if index < self.values.len() { self.get(index, what) } else { Ok(default) }
    }

    /// `None` for a missing argument, `-` or `none`.
    fn optional<T: std::str::FromStr>(&self, index: usize, what: &str) -> Result<Option<T>, ScriptError> {
        match self.values.get(index) {
            None => Ok(None),
            Some(v) if *v == "-" || v.eq_ignore_ascii_case("none") => Ok(None),
            Some(_) => self.get(index, what).map(Some),
        }
    }

    fn none(&self) -> Result<(), ScriptError> {
        self.arity("no arguments", 0..=0)
    }
}

fn command(args: &Args<'_>) -> Result<TurtleCommand, ScriptError> {
    use TurtleCommand as C;

    let angle = |sign: f64| -> Result<TurtleCommand, ScriptError> {
        args.arity("an angle", 1..=1)?;
        let angle = args.get::<f64>(0, "angle")? * sign;
        Ok(match args.op {
            "&" | "^" | "pitch" => C::Pitch { angle },
            "/" | "\\" | "roll" => C::Roll { angle },
            _ => C::Turn { angle },
        })
    };
    let scaled = |make: fn(usize, f64) -> TurtleCommand| -> Result<TurtleCommand, ScriptError> {
        args.arity("an id and an optional scale", 1..=2)?;
        Ok(make(args.get(0, "id")?, args.get_or(1, "scale", 1.0)?))
    };
    let shape = |make: fn(f64, f64) -> TurtleCommand| -> Result<TurtleCommand, ScriptError> {
        args.arity("a length and a width", 2..=2)?;
        Ok(make(args.get(0, "length")?, args.get(1, "width")?))
    };

    let cmd = match args.op {
        "F" | "forward" => {
            args.arity("an optional distance", 0..=1)?;
            C::Forward { distance: args.get_or(0, "distance", 1.0)? }
        }
        "f" | "move" => {
            args.arity("an optional distance", 0..=1)?;
            C::Move { distance: args.get_or(0, "distance", 1.0)? }
        }
        "+" | "&" | "/" | "turn" | "pitch" | "roll" => angle(1.0)?,
        "-" | "^" | "\\" => angle(-1.0)?,
        "|" | "turn_around" => args.none().map(|()| C::TurnAround)?,
        "$" | "roll_to_horizontal" => args.none().map(|()| C::RollToHorizontal)?,
        "set_heading" => {
            args.arity("a direction", 3..=3)?;
            C::SetHeading { direction: [args.get(0, "x")?, args.get(1, "y")?, args.get(2, "z")?] }
        }
        "[" | "push" => args.none().map(|()| C::Push)?,
        "]" | "pop" => args.none().map(|()| C::Pop)?,
        "!" | "set_width" => {
            args.arity("a width", 1..=1)?;
            C::SetWidth { width: args.get(0, "width")? }
        }
        "set_scale" => {
            args.arity("two radii", 2..=2)?;
            C::SetScale { p: args.get(0, "p")?, q: args.get(1, "q")? }
        }
        ";" | "set_color" => {
            args.arity("a color index", 1..=1)?;
            C::SetColor { index: args.get(0, "color index")? }
        }
        "set_texture" => {
            args.arity("an optional texture id", 0..=1)?;
            C::SetTexture { id: args.optional(0, "texture id")? }
        }
        "set_contour" => {
            args.arity("a contour id", 1..=1)?;
            C::SetContour { id: args.get(0, "contour id")? }
        }
        "blend_contours" => {
            args.arity("two contour ids and a blend factor", 3..=3)?;
            C::BlendContours {
                first: args.get(0, "contour id")?,
                second: args.get(1, "contour id")?,
                blend: args.get(2, "blend factor")?,
            }
        }
        "set_divisions" => {
            args.arity("an optional division count", 0..=1)?;
            C::SetDivisions { divisions: args.optional(0, "division count")? }
        }
        "set_gc_normal" => {
            let normal = if args.values.len() == 3 {
                Some([args.get(0, "x")?, args.get(1, "y")?, args.get(2, "z")?])
            } else {
                args.arity("a direction, `none` or nothing", 0..=1)?;
                if let Some(value) = args.optional::<String>(0, "normal")? {
                    return Err(ScriptError::Argument {
                        line: args.line,
                        message: format!("expected a direction or `none`, got `{value}`"),
                    });
                }
                None
            };
            C::SetGcNormal { normal }
        }
        "set_tapering" => {
            args.arity("an optional on/off flag", 0..=1)?;
            C::SetTapering { enabled: args.optional(0, "flag")? }
        }
        "@Gs" | "start_gc" => args.none().map(|()| C::StartGc)?,
        "@Gc" | "point_gc" => args.none().map(|()| C::PointGc)?,
        "@Ge" | "end_gc" => args.none().map(|()| C::EndGc)?,
        "{" | "start_polygon" => args.none().map(|()| C::StartPolygon)?,
        "." | "polygon_point" => args.none().map(|()| C::PolygonPoint)?,
        "}" | "end_polygon" => args.none().map(|()| C::EndPolygon)?,
        "@o" | "circle" => {
            args.arity("a diameter", 1..=1)?;
            C::Circle { diameter: args.get(0, "diameter")? }
        }
        "@O" | "sphere" => {
            args.arity("a diameter", 1..=1)?;
            C::Sphere { diameter: args.get(0, "diameter")? }
        }
        "rhombus" => shape(|length, width| C::Rhombus { length, width })?,
        "triangle" => shape(|length, width| C::Triangle { length, width })?,
        "~" | "surface" => scaled(|id, scale| C::Surface { id, scale })?,
        "wrapped_surface" => scaled(|id, scale| C::WrappedSurface { id, scale })?,
        "mesh" => scaled(|id, scale| C::Mesh { id, scale })?,
        "blended_wrapped_surface" => {
            args.arity("two ids, a blend factor and an optional scale", 3..=4)?;
            C::BlendedWrappedSurface {
                first: args.get(0, "id")?,
                second: args.get(1, "id")?,
                blend: args.get(2, "blend factor")?,
                scale: args.get_or(3, "scale", 1.0)?,
            }
        }
        "label" => C::Label { text: args.values.join(" ") },
        _ => {
            return Err(ScriptError::UnknownCommand { line: args.line, op: args.op.to_owned() });
        }
    };
    Ok(cmd)
}

/// Parses a whole script; the first bad line fails it.
pub fn parse_script(text: &str) -> Result<Vec<TurtleCommand>, ScriptError> {
    let commands = content_lines(text)
        .map(|(line, content)| {
            let mut tokens = content.split_whitespace();
            let op = tokens.next().unwrap_or_default();
            command(&Args { line, op, values: tokens.collect() })
        })
        .collect::<Result<Vec<_>, _>>()?;
    log::debug!("parsed {} script commands", commands.len());
    Ok(commands)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symbols_and_names_parse_to_the_same_commands() {
        let script = "\
F 2
forward 2
+ 30
- 30
& 10
\\ 45
[
]
; 3
set_texture none
set_divisions 12
@Gs
@Ge
";
        let commands = parse_script(script).unwrap();
        assert_eq!(commands[0], commands[1]);
        assert_eq!(commands[2], TurtleCommand::Turn { angle: 30.0 });
        assert_eq!(commands[3], TurtleCommand::Turn { angle: -30.0 });
        assert_eq!(commands[4], TurtleCommand::Pitch { angle: 10.0 });
        assert_eq!(commands[5], TurtleCommand::Roll { angle: -45.0 });
        assert_eq!(commands[6], TurtleCommand::Push);
        assert_eq!(commands[8], TurtleCommand::SetColor { index: 3 });
        assert_eq!(commands[9], TurtleCommand::SetTexture { id: None });
        assert_eq!(commands[10], TurtleCommand::SetDivisions { divisions: Some(12) });
        assert_eq!(commands[12], TurtleCommand::EndGc);
    }

    #[test]
    fn forward_defaults_to_unit_distance() {
        assert_eq!(parse_script("F").unwrap(), vec![TurtleCommand::Forward { distance: 1.0 }]);
    }

    #[test]
    fn errors_carry_the_line_number() {
        let err = parse_script("F\n\n+ thirty\n").unwrap_err();
        assert!(matches!(err, ScriptError::Argument { line: 3, .. }));
        let err = parse_script("warp 9\n").unwrap_err();
        assert!(matches!(err, ScriptError::UnknownCommand { line: 1, .. }));
        let err = parse_script("sphere\n").unwrap_err();
        assert!(matches!(err, ScriptError::Arity { got: 0, .. }));
    }

    #[test]
    fn gc_normal_accepts_a_vector_or_nothing() {
        let commands = parse_script("set_gc_normal 0 0 1\nset_gc_normal\n").unwrap();
        assert_eq!(commands[0], TurtleCommand::SetGcNormal { normal: Some([0.0, 0.0, 1.0]) });
        assert_eq!(commands[1], TurtleCommand::SetGcNormal { normal: None });
    }
}
