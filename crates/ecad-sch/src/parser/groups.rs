use std::collections::{HashMap, HashSet};

use ecad_core::{Kiid, LibId};
use ecad_sexpr::TokenKind;

use crate::document::Document;
use crate::error::SchError;
use crate::item::{Group, SchItem, SchItemKind};

use super::{GroupInfo, SchParser};

impl<'a, 'd> SchParser<'a, 'd> {
    /// `(group "Name" (uuid ...) [(lib_id ...)] (members uuid...))`.
    ///
    /// Members are referenced by UUID and may not exist yet, so the
    /// definition goes to a side list; [`SchParser::resolve_groups`] runs
    /// after the sheet is fully parsed.
    pub(crate) fn parse_group(&mut self) -> Result<(), SchError> {
        let mut info = GroupInfo::default();

        loop {
            match self.lex.next()? {
                TokenKind::Left => break,
                TokenKind::Quoted => info.name = self.lex.text().to_owned(),
                _ => return Err(self.expecting("group name or locked")),
            }
        }

        loop {
            // The current token is the Left that terminated the name loop or
            // the one that follows a completed subform.
            self.lex.next()?;
            let tok = self.lex.text().to_owned();

            match tok.as_str() {
                "uuid" => {
                    info.uuid = self.parse_kiid()?;
                    self.lex.need_right()?;
                }
                "lib_id" => {
                    self.lex.next()?;

                    if !self.lex.cur().is_symbol_or_number() {
                        return Err(self.expecting("symbol|number"));
                    }

                    let name = Self::unescape_slash(self.lex.text());
                    let lib_id =
                        LibId::parse(&name).map_err(|err| self.malformed(err.to_string()))?;
                    info.lib_id = Some(lib_id);
                    self.lex.need_right()?;
                }
                "members" => loop {
                    match self.lex.next()? {
                        TokenKind::Right => break,
                        _ if self.lex.cur().is_symbol_or_number() => {
                            // Group members reference existing items; their
                            // UUIDs must not be de-duplicated.
                            if let Ok(id) = self.lex.text().parse::<Kiid>() {
                                info.members.push(id);
                            } else {
                                log::debug!(
                                    "dropping malformed group member uuid '{}'",
                                    self.lex.text()
                                );
                            }
                        }
                        _ => return Err(self.expecting("member uuid")),
                    }
                },
                _ => return Err(self.expecting("uuid, lib_id, members")),
            }

            match self.lex.next()? {
                TokenKind::Right => break,
                TokenKind::Left => {}
                _ => return Err(self.expecting("(")),
            }
        }

        self.group_infos.push(info);
        Ok(())
    }

    /// Materialize parsed group definitions into items and link members.
    ///
    /// Group objects are created first (so nested groups can resolve each
    /// other), then each member UUID is linked to the already-created item.
    /// Missing members are silently dropped (corrupt file); membership
    /// cycles are broken with a warning.
    pub(crate) fn resolve_groups(&mut self, doc: &mut Document) {
        if self.group_infos.is_empty() {
            return;
        }

        let infos = std::mem::take(&mut self.group_infos);

        // First add all group items so member lookup sees nested groups.
        for info in &infos {
            doc.items.push(SchItem {
                uuid: info.uuid,
                kind: SchItemKind::Group(Group {
                    name: info.name.clone(),
                    design_block_lib_id: info.lib_id.clone(),
                    members: Vec::new(),
                }),
            });
        }

        let existing: HashSet<Kiid> = doc.items.iter().map(|i| i.uuid).collect();

        // Membership edges between groups, for the cycle check.
        let group_ids: HashSet<Kiid> = infos.iter().map(|i| i.uuid).collect();
        let mut edges: HashMap<Kiid, Vec<Kiid>> = HashMap::new();

        for info in &infos {
            let members: Vec<Kiid> = info
                .members
                .iter()
                .copied()
                .filter(|m| existing.contains(m))
                .collect();

            edges.insert(
                info.uuid,
                members.iter().copied().filter(|m| group_ids.contains(m)).collect(),
            );

            if let Some(item) = doc.item_mut(info.uuid) {
                if let SchItemKind::Group(group) = &mut item.kind {
                    group.members = members;
                }
            }
        }

        // Break membership cycles: walk each group's nested-group chain and
        // cut any edge that returns to an ancestor.
        for info in &infos {
            let mut stack = vec![info.uuid];
            let mut path: HashSet<Kiid> = HashSet::new();
            path.insert(info.uuid);

            while let Some(current) = stack.pop() {
                let nested = edges.get(&current).cloned().unwrap_or_default();

                for child in nested {
                    if path.contains(&child) {
                        self.diag.warn(format!(
                            "Group '{}' contains a membership cycle; the cyclic member was \
                             removed.",
                            info.name
                        ));

                        if let Some(item) = doc.item_mut(current) {
                            if let SchItemKind::Group(group) = &mut item.kind {
                                group.members.retain(|m| *m != child);
                            }
                        }

                        edges.get_mut(&current).map(|e| e.retain(|m| *m != child));
                    } else {
                        path.insert(child);
                        stack.push(child);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ecad_core::Diagnostics;

    #[test]
    fn group_members_resolve_after_parse() {
        let a = Kiid::new();
        let b = Kiid::new();
        let missing = Kiid::new();
        let group_id = Kiid::new();

        let input = format!(
            r#"(kicad_sch (version 20250114) (generator eeschema) (generator_version "9.0")
                (uuid {root})
                (lib_symbols)
                (junction (at 0 0) (diameter 0) (uuid {a}))
                (junction (at 10 10) (diameter 0) (uuid {b}))
                (group "Power" (uuid {group_id}) (members {a} {b} {missing}))
            )"#,
            root = Kiid::new(),
        );

        let mut diag = Diagnostics::new();
        let mut parser = SchParser::new(&input, "test.kicad_sch", &mut diag);
        let doc = parser.parse_schematic().unwrap();

        let group = doc
            .items
            .iter()
            .find_map(|i| match &i.kind {
                SchItemKind::Group(g) => Some((i.uuid, g)),
                _ => None,
            })
            .expect("group item");

        assert_eq!(group.0, group_id);
        assert_eq!(group.1.name, "Power");
        // The missing member is silently dropped.
        assert_eq!(group.1.members, vec![a, b]);
    }
}
