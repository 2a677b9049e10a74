//! Markup rendering of control trees.
use core::fmt::{self, Write};

use property_table::PropertyId;
use proptree_registry::Registry;

use crate::{
    tree::{NodeId, Tree},
    value::Value,
};

/// Renders a subtree as markup, see [`Tree::markup`].
///
/// Ungrouped properties become attributes named after their declaration, members of declared
/// property groups become attributes named by the group prefix and the member name. Template
/// properties become nested elements holding the rendered template. Properties in groups the
/// registry doesn't know are skipped.
pub struct Markup<'a> {
    tree: &'a Tree,
    registry: &'a Registry,
    root: NodeId,
}

impl Tree {
    /// Returns a [`Display`][fmt::Display] implementation rendering the subtree at `root`.
    pub fn markup<'a>(&'a self, registry: &'a Registry, root: NodeId) -> Markup<'a> {
        Markup {
            tree: self,
            registry,
            root,
        }
    }
}

struct Escaped<'a>(&'a str);

impl fmt::Display for Escaped<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for c in self.0.chars() {
            match c {
                '&' => f.write_str("&amp;")?,
                '<' => f.write_str("&lt;")?,
                '>' => f.write_str("&gt;")?,
                '"' => f.write_str("&quot;")?,
                c => f.write_char(c)?,
            }
        }
        Ok(())
    }
}

fn indent(f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
    for _ in 0..depth {
        f.write_str("  ")?;
    }
    Ok(())
}

impl Markup<'_> {
    fn write_attribute(
        &self,
        f: &mut fmt::Formatter<'_>,
        name: impl fmt::Display,
        value: &Value,
    ) -> fmt::Result {
        match value {
            Value::Null => write!(f, " {name}"),
            value => write!(f, " {name}=\"{}\"", Escaped(&value.to_string())),
        }
    }

    fn property_name(&self, id: PropertyId) -> String {
        match self.registry.property(id) {
            Some(declaration) => declaration.name().to_owned(),
            None => id.to_string(),
        }
    }

    fn write_node(&self, f: &mut fmt::Formatter<'_>, id: NodeId, depth: usize) -> fmt::Result {
        let node = &self.tree[id];
        let properties = node.properties();

        indent(f, depth)?;
        write!(f, "<{}", node.tag())?;

        let mut ungrouped: Vec<_> = properties
            .iter()
            .filter(|(property, _)| !property.is_group_member())
            .collect();
        ungrouped.sort_unstable_by_key(|&(property, _)| property);

        let mut templates = vec![];
        for &(property, value) in &ungrouped {
            match value.template() {
                Some(template) => templates.push((property, template)),
                None => self.write_attribute(f, self.property_name(property), value)?,
            }
        }

        for group in self.registry.groups() {
            let members = properties.group(group.group_id());
            if members.is_empty() {
                continue;
            }
            let mut members: Vec<_> = members.into_iter().collect();
            members.sort_unstable_by_key(|&(property, _)| property);
            for (property, value) in members {
                match value.template() {
                    Some(template) => templates.push((property, template)),
                    None => self.write_attribute(
                        f,
                        format_args!("{}{}", group.prefix(), self.property_name(property)),
                        value,
                    )?,
                }
            }
        }

        if templates.is_empty() && node.children().is_empty() {
            return f.write_str(" />\n");
        }
        f.write_str(">\n")?;

        for (property, template) in templates {
            let name = match self.registry.property(property) {
                Some(declaration) => declaration.to_string(),
                None => property.to_string(),
            };
            indent(f, depth + 1)?;
            writeln!(f, "<{name}>")?;
            self.write_node(f, template, depth + 2)?;
            indent(f, depth + 1)?;
            writeln!(f, "</{name}>")?;
        }

        for &child in node.children() {
            self.write_node(f, child, depth + 1)?;
        }

        indent(f, depth)?;
        writeln!(f, "</{}>", node.tag())
    }
}

impl fmt::Display for Markup<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_node(f, self.root, 0)
    }
}
