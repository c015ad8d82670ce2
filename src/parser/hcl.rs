use tree_sitter::{Node, Tree};

use crate::graph::records::NodeKind;
use crate::parser::{Definition, FileFacts, ImportRecord, node_text};

/// Extract facts from an HCL/Terraform syntax tree.
///
/// Each top-level block becomes one definition whose name encodes the block
/// type and its labels (`resource.aws_s3_bucket.logs`, `variable.region`,
/// `locals`, …). A `module` block whose `source` attribute is a relative path
/// contributes an import of that path. HCL produces no call records.
///
/// Blocks are walked manually rather than through a compiled query: the block
/// shape is uniform (`identifier` + labels + body) and nested blocks must not
/// become nodes, which a tree query would match.
pub fn extract_hcl_facts(tree: &Tree, source: &[u8]) -> FileFacts {
    let mut facts = FileFacts::default();

    for block in top_level_blocks(tree.root_node()) {
        let mut block_type: Option<&str> = None;
        let mut labels: Vec<String> = Vec::new();

        let mut cursor = block.walk();
        for child in block.children(&mut cursor) {
            match child.kind() {
                "identifier" if block_type.is_none() => {
                    block_type = Some(node_text(child, source));
                }
                "identifier" => labels.push(node_text(child, source).to_owned()),
                "string_lit" => {
                    labels.push(node_text(child, source).trim_matches('"').to_owned());
                }
                _ => {}
            }
        }

        let Some(block_type) = block_type else { continue };
        let Some(kind) = NodeKind::from_hcl_block(block_type) else {
            continue;
        };

        let mut name_parts = vec![block_type.to_owned()];
        name_parts.extend(labels);
        let name = name_parts.join(".");

        if kind == NodeKind::Module
            && let Some(module_source) = block_source_attribute(block, source)
            && module_source.starts_with('.')
        {
            facts.imports.push(ImportRecord {
                source: module_source,
                names: Vec::new(),
                type_only: false,
                reexport: false,
                wildcard: false,
            });
        }

        facts.definitions.push(Definition {
            name,
            kind,
            line: block.start_position().row as u32 + 1,
            end_line: Some(block.end_position().row as u32 + 1),
            exported: true,
            decorators: Vec::new(),
        });
    }

    facts
}

/// Iterate the blocks of the file-level body (nested blocks excluded).
fn top_level_blocks(root: Node) -> Vec<Node> {
    let mut blocks = Vec::new();
    let mut cursor = root.walk();
    for child in root.children(&mut cursor) {
        match child.kind() {
            "body" => {
                let mut inner = child.walk();
                for grandchild in child.children(&mut inner) {
                    if grandchild.kind() == "block" {
                        blocks.push(grandchild);
                    }
                }
            }
            "block" => blocks.push(child),
            _ => {}
        }
    }
    blocks
}

/// Find the string value of a block's `source` attribute, if present.
fn block_source_attribute(block: Node, source: &[u8]) -> Option<String> {
    let mut cursor = block.walk();
    for child in block.children(&mut cursor) {
        if child.kind() != "body" {
            continue;
        }
        let mut inner = child.walk();
        for attr in child.children(&mut inner) {
            if attr.kind() != "attribute" {
                continue;
            }
            let mut attr_cursor = attr.walk();
            let is_source = attr
                .children(&mut attr_cursor)
                .find(|c| c.kind() == "identifier")
                .map(|c| node_text(c, source) == "source")
                .unwrap_or(false);
            if is_source {
                return first_string_value(attr, source);
            }
        }
    }
    None
}

/// Depth-first search for the first string literal beneath `node`, with the
/// surrounding quotes stripped.
fn first_string_value(node: Node, source: &[u8]) -> Option<String> {
    if matches!(node.kind(), "string_lit" | "template_literal") {
        return Some(node_text(node, source).trim_matches('"').to_owned());
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if let Some(found) = first_string_value(child, source) {
            return Some(found);
        }
    }
    None
}
