//! Just enough GLSL understanding to reflect a program's interface.
//!
//! The software device does not execute shader code. It reads the
//! declarations (uniforms, vertex inputs, fragment outputs) so that uniform
//! lookup by name behaves like a real driver and the fragment stage can be
//! emulated from the declared interface.

use crate::error::{Result, ViewerError};
use crate::gpu::device::ShaderStage;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GlslType {
    Int,
    Float,
    Vec2,
    Vec3,
    Vec4,
    Mat4,
    Sampler2D,
}

impl GlslType {
    fn parse(token: &str) -> Option<Self> {
        match token {
            "int" => Some(GlslType::Int),
            "float" => Some(GlslType::Float),
            "vec2" => Some(GlslType::Vec2),
            "vec3" => Some(GlslType::Vec3),
            "vec4" => Some(GlslType::Vec4),
            "mat4" => Some(GlslType::Mat4),
            "sampler2D" => Some(GlslType::Sampler2D),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    pub ty: GlslType,
    pub name: String,
    /// Explicit `layout (location = N)`, if present.
    pub location: Option<u32>,
}

/// Declarations found in one shader stage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShaderInterface {
    pub uniforms: Vec<Declaration>,
    pub inputs: Vec<Declaration>,
    pub outputs: Vec<Declaration>,
    pub writes_position: bool,
}

/// Checks the source for the structure every stage needs and extracts its
/// interface. Errors carry a driver-style info log.
pub fn reflect(stage: ShaderStage, source: &str) -> Result<ShaderInterface> {
    let fail = |log: String| ViewerError::ShaderCompile { stage, log };

    let code = strip_comments(source);

    if !code.trim_start().starts_with("#version") {
        return Err(fail("0:1: '#version' directive missing".into()));
    }
    if !code.contains("void main") {
        return Err(fail("entry point 'void main()' not found".into()));
    }

    let mut depth: i64 = 0;
    for (line_no, line) in code.lines().enumerate() {
        for ch in line.chars() {
            match ch {
                '{' => depth += 1,
                '}' => depth -= 1,
                _ => {}
            }
            if depth < 0 {
                return Err(fail(format!("0:{}: unexpected '}}'", line_no + 1)));
            }
        }
    }
    if depth != 0 {
        return Err(fail("unexpected end of file, missing '}'".into()));
    }

    let mut interface = ShaderInterface {
        writes_position: code.contains("gl_Position"),
        ..Default::default()
    };

    let body: String = code
        .lines()
        .filter(|line| !line.trim_start().starts_with('#'))
        .collect::<Vec<_>>()
        .join("\n");

    for statement in body.split(';') {
        // Declarations live at global scope and never contain braces.
        let statement = statement.rsplit(['{', '}']).next().unwrap_or("").trim();
        if statement.is_empty() {
            continue;
        }

        let (location, rest) = split_layout(statement);
        let tokens: Vec<&str> = rest.split_whitespace().collect();
        let (qualifier, type_token, name) = match tokens.as_slice() {
            [q, t, n] => (*q, *t, *n),
            // precision qualifiers such as `uniform highp vec3 color`
            [q, _, t, n] if matches!(*q, "uniform" | "in" | "out") => (*q, *t, *n),
            _ => continue,
        };

        let Some(ty) = GlslType::parse(type_token) else {
            if qualifier == "uniform" {
                return Err(fail(format!("unsupported uniform type '{}'", type_token)));
            }
            continue;
        };

        let decl = Declaration {
            ty,
            name: name.to_string(),
            location,
        };
        match qualifier {
            "uniform" => interface.uniforms.push(decl),
            "in" => interface.inputs.push(decl),
            "out" => interface.outputs.push(decl),
            _ => {}
        }
    }

    if stage == ShaderStage::Vertex && !interface.writes_position {
        return Err(fail("vertex stage never writes gl_Position".into()));
    }
    if stage == ShaderStage::Fragment && interface.outputs.is_empty() {
        return Err(fail("fragment stage declares no output".into()));
    }

    Ok(interface)
}

fn split_layout(statement: &str) -> (Option<u32>, &str) {
    let Some(rest) = statement.strip_prefix("layout") else {
        return (None, statement);
    };
    let Some(close) = rest.find(')') else {
        return (None, statement);
    };
    let inside = &rest[..close];
    let location = inside
        .split(',')
        .filter_map(|part| part.split_once('='))
        .find(|(key, _)| key.trim().trim_start_matches('(').trim() == "location")
        .and_then(|(_, value)| value.trim().parse().ok());
    (location, rest[close + 1..].trim())
}

fn strip_comments(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    let mut rest = source;
    while !rest.is_empty() {
        if let Some(after) = rest.strip_prefix("//") {
            rest = after.find('\n').map_or("", |i| &after[i..]);
        } else if let Some(after) = rest.strip_prefix("/*") {
            rest = after.find("*/").map_or("", |i| &after[i + 2..]);
        } else {
            let mut chars = rest.chars();
            if let Some(c) = chars.next() {
                out.push(c);
            }
            rest = chars.as_str();
        }
    }
    out
}
