//! Placeholder substitution for the reload-service script.

/// File name of the script that carries the reload client.
pub const RELOAD_SCRIPT: &str = "reload-service.js";

/// Marker preceding the port literal in a rendered script.
const PORT_MARKER: &str = "const RELOAD_PORT = ";

/// Marker preceding the quoted instance id in a rendered script.
const INSTANCE_ID_MARKER: &str = "const INSTANCE_ID = ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placeholder {
    ReloadPort,
    InstanceId,
}

impl Placeholder {
    pub const ALL: [Placeholder; 2] = [Placeholder::ReloadPort, Placeholder::InstanceId];

    pub fn token(self) -> &'static str {
        match self {
            Placeholder::ReloadPort => "__RELOAD_PORT__",
            Placeholder::InstanceId => "__INSTANCE_ID__",
        }
    }
}

/// Values substituted into the script template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateValues {
    pub reload_port: u16,
    pub instance_id: String,
}

impl TemplateValues {
    fn value(&self, placeholder: Placeholder) -> String {
        match placeholder {
            Placeholder::ReloadPort => self.reload_port.to_string(),
            Placeholder::InstanceId => self.instance_id.clone(),
        }
    }
}

/// Replace every placeholder token in one left-to-right pass.
///
/// Substituted values are never rescanned, so a value that happens to
/// contain a token is emitted literally.
pub fn render(template: &str, values: &TemplateValues) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while !rest.is_empty() {
        let next = Placeholder::ALL
            .iter()
            .filter_map(|p| rest.find(p.token()).map(|at| (at, *p)))
            .min_by_key(|(at, _)| *at);

        let Some((at, placeholder)) = next else {
            out.push_str(rest);
            break;
        };
        out.push_str(&rest[..at]);
        out.push_str(&values.value(placeholder));
        rest = &rest[at + placeholder.token().len()..];
    }

    out
}

/// Read the port a rendered script was generated for.
pub fn embedded_port(script: &str) -> Option<u16> {
    let start = script.find(PORT_MARKER)? + PORT_MARKER.len();
    let digits: String = script[start..]
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

/// Read the instance id a rendered script was generated for.
pub fn embedded_instance_id(script: &str) -> Option<&str> {
    let start = script.find(INSTANCE_ID_MARKER)? + INSTANCE_ID_MARKER.len();
    let rest = &script[start..];
    let quote = rest.chars().next().filter(|c| *c == '"' || *c == '\'')?;
    let body = &rest[1..];
    let end = body.find(quote)?;
    let id = &body[..end];
    (!id.is_empty() && !id.contains(Placeholder::InstanceId.token())).then_some(id)
}
