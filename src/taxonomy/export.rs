//! Taxonomy XML export for consumer agents.
//!
//! Produces the discovery document: `<available_skills>` with one `<skill>`
//! child per artifact, holding name, description, and location.

use super::TaxonomyManager;

/// Escape the five XML-reserved characters.
fn xml_escape(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            other => out.push(other),
        }
    }
    out
}

/// Render the full taxonomy as the discovery XML document.
///
/// Skills that fail to load are skipped, matching the enumeration policy.
pub fn export_taxonomy_xml(manager: &TaxonomyManager) -> String {
    let mut doc = String::from("<available_skills>\n");
    for path in manager.list_skills() {
        // list_skills already proved the artifact parses; a racing delete
        // just drops the entry.
        let Ok(artifact) = manager.read_artifact(&path) else {
            continue;
        };
        doc.push_str("  <skill>\n");
        doc.push_str(&format!(
            "    <name>{}</name>\n",
            xml_escape(&artifact.frontmatter.name)
        ));
        doc.push_str(&format!(
            "    <description>{}</description>\n",
            xml_escape(&artifact.frontmatter.description)
        ));
        doc.push_str(&format!(
            "    <location>{}</location>\n",
            xml_escape(path.as_str())
        ));
        doc.push_str("  </skill>\n");
    }
    doc.push_str("</available_skills>\n");
    doc
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::taxonomy::{
        SkillArtifact, SkillDescriptor, SkillFrontmatter, SkillType, SkillWeight, TaxonomyPath,
    };
    use tempfile::TempDir;

    fn artifact(id: &str, description: &str) -> SkillArtifact {
        let path = TaxonomyPath::parse(id).unwrap();
        SkillArtifact {
            frontmatter: SkillFrontmatter {
                name: path.skill_name(),
                description: description.into(),
                metadata: SkillDescriptor {
                    skill_id: path,
                    version: "1.0.0".into(),
                    skill_type: SkillType::Reference,
                    weight: SkillWeight::Light,
                    load_priority: Default::default(),
                    dependencies: vec![],
                    capabilities: vec![],
                },
            },
            body: "body".into(),
        }
    }

    #[tokio::test]
    async fn exports_skills_with_locations() {
        let dir = TempDir::new().unwrap();
        let mgr = TaxonomyManager::new(dir.path()).unwrap();
        mgr.write_skill(&artifact("dev/git", "Git reference"))
            .await
            .unwrap();

        let xml = tokio::task::spawn_blocking(move || export_taxonomy_xml(&mgr))
            .await
            .unwrap();
        assert!(xml.starts_with("<available_skills>"));
        assert!(xml.contains("<name>dev-git</name>"));
        assert!(xml.contains("<description>Git reference</description>"));
        assert!(xml.contains("<location>dev/git</location>"));
        assert!(xml.trim_end().ends_with("</available_skills>"));
    }

    #[tokio::test]
    async fn escapes_reserved_characters() {
        let dir = TempDir::new().unwrap();
        let mgr = TaxonomyManager::new(dir.path()).unwrap();
        mgr.write_skill(&artifact("dev/cmp", "Less <than> & \"more\""))
            .await
            .unwrap();

        let xml = tokio::task::spawn_blocking(move || export_taxonomy_xml(&mgr))
            .await
            .unwrap();
        assert!(xml.contains("Less &lt;than&gt; &amp; &quot;more&quot;"));
        assert!(!xml.contains("<than>"));
    }

    #[test]
    fn empty_taxonomy_exports_empty_document() {
        let dir = TempDir::new().unwrap();
        let mgr = TaxonomyManager::new(dir.path()).unwrap();
        let xml = export_taxonomy_xml(&mgr);
        assert_eq!(xml, "<available_skills>\n</available_skills>\n");
    }
}
