//! Init-script template rendering.
//!
//! Rendering is a pure function over the template text: `{{ name }}` and
//! `{{ port }}` placeholders are substituted and nothing else is
//! interpreted. The allocated port is passed straight into the render so
//! the script is written exactly once.

use cs_common::{Error, Result};
use std::path::Path;

/// Substitute placeholders in template text.
///
/// An unset port renders as the literal `None`, which the service runtime
/// treats as "use the default".
pub fn render(template: &str, name: &str, port: Option<u16>) -> String {
    let port_text = match port {
        Some(p) => p.to_string(),
        None => "None".to_string(),
    };
    template
        .replace("{{ name }}", name)
        .replace("{{name}}", name)
        .replace("{{ port }}", &port_text)
        .replace("{{port}}", &port_text)
}

/// Load the template file and render it.
pub fn render_file(template_path: &Path, name: &str, port: Option<u16>) -> Result<String> {
    let text = std::fs::read_to_string(template_path).map_err(|e| {
        Error::Render(format!("template {}: {e}", template_path.display()))
    })?;
    Ok(render(&text, name, port))
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEMPLATE: &str = "#!/bin/sh\n# service {{ name }}\nPORT={{ port }}\n";

    #[test]
    fn substitutes_name_and_port() {
        let script = render(TEMPLATE, "task", Some(6481));
        assert!(script.contains("# service task"));
        assert!(script.contains("PORT=6481"));
    }

    #[test]
    fn unset_port_renders_none_literal() {
        let script = render(TEMPLATE, "task", None);
        assert!(script.contains("PORT=None"));
    }

    #[test]
    fn missing_template_is_render_error() {
        let err = render_file(Path::new("/nonexistent/csinit"), "task", None).unwrap_err();
        assert!(matches!(err, Error::Render(_)));
    }
}
