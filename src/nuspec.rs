//! Nuspec XML reader (spec §4.6 step 3): maps `<dependencies>` groups to
//! `DependencyGroup`, preserving the framework identifier exactly as
//! written. Project-file XML parsing is the external collaborator's job
//! (spec §6); nuspec parsing is not, and the teacher's dependency stack has
//! no XML support, so this reads with `quick-xml`.

use std::io::BufRead;

use nuget_schemas::identity::{DependencyGroup, PackageDependency};
use nuget_util::errors::{RestoreError, RestoreResult};
use quick_xml::events::Event;
use quick_xml::reader::Reader;

/// Parses the `<dependencies>` element of a nuspec document. Any read or
/// structural failure is a `Parse` error so the local metadata provider's
/// caller can fall back to "not cached" (spec §4.6's "errors reading a
/// cached nuspec must not fail the restore").
pub fn parse_dependency_groups(path: &std::path::Path, xml: impl BufRead) -> RestoreResult<Vec<DependencyGroup>> {
    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(true);

    let mut groups = Vec::new();
    let mut current: Option<DependencyGroup> = None;
    let mut buf = Vec::new();

    loop {
        let event = reader.read_event_into(&mut buf).map_err(|e| parse_err(path, &e))?;
        match event {
            Event::Eof => break,
            Event::Start(tag) => {
                if local_name(&tag) == "group" {
                    current = Some(DependencyGroup {
                        target_framework: attr(&tag, "targetFramework")
                            .unwrap_or_else(|| DependencyGroup::ANY.to_string()),
                        dependencies: Vec::new(),
                    });
                } else if local_name(&tag) == "dependency" {
                    push_dependency(&tag, path, &mut current, &mut groups)?;
                }
            }
            Event::Empty(tag) => {
                if local_name(&tag) == "group" {
                    groups.push(DependencyGroup {
                        target_framework: attr(&tag, "targetFramework")
                            .unwrap_or_else(|| DependencyGroup::ANY.to_string()),
                        dependencies: Vec::new(),
                    });
                } else if local_name(&tag) == "dependency" {
                    push_dependency(&tag, path, &mut current, &mut groups)?;
                }
            }
            Event::End(tag) => {
                if local_name_end(&tag) == "group" {
                    if let Some(group) = current.take() {
                        groups.push(group);
                    }
                }
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(groups)
}

fn push_dependency(
    tag: &quick_xml::events::BytesStart<'_>,
    path: &std::path::Path,
    current: &mut Option<DependencyGroup>,
    groups: &mut Vec<DependencyGroup>,
) -> RestoreResult<()> {
    let id = attr(tag, "id").ok_or_else(|| parse_err_msg(path, "dependency missing id"))?;
    let range = attr(tag, "version").unwrap_or_else(|| "0.0.0".to_string());
    let dep = PackageDependency { id, range };
    match current {
        Some(group) => group.dependencies.push(dep),
        // A bare <dependency> outside any <group> belongs to the implicit "any" group.
        None => groups.push(DependencyGroup {
            target_framework: DependencyGroup::ANY.to_string(),
            dependencies: vec![dep],
        }),
    }
    Ok(())
}

fn local_name(tag: &quick_xml::events::BytesStart<'_>) -> String {
    String::from_utf8_lossy(tag.local_name().as_ref()).into_owned()
}

fn local_name_end(tag: &quick_xml::events::BytesEnd<'_>) -> String {
    String::from_utf8_lossy(tag.local_name().as_ref()).into_owned()
}

fn attr(tag: &quick_xml::events::BytesStart<'_>, name: &str) -> Option<String> {
    tag.attributes().flatten().find_map(|a| {
        if a.key.local_name().as_ref() == name.as_bytes() {
            Some(String::from_utf8_lossy(&a.value).into_owned())
        } else {
            None
        }
    })
}

fn parse_err(path: &std::path::Path, e: &quick_xml::Error) -> RestoreError {
    RestoreError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    }
}

fn parse_err_msg(path: &std::path::Path, message: &str) -> RestoreError {
    RestoreError::Parse {
        path: path.to_path_buf(),
        message: message.to_string(),
    }
}
