//! Static description of one facade's place in the registry path space.

/// Names a facade's group/resource vocabulary.
///
/// Paths are composed from these, e.g. for npm:
/// `/noderegistries/npmjs.org/packages/express/versions/4.0.0`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryMeta {
    /// Registry identifier reported at the root (`npm-wrapper` style ids).
    pub registry_id: &'static str,
    /// Group collection segment (`noderegistries`).
    pub group_plural: &'static str,
    /// Group singular, used for `<group>id` attributes (`noderegistry`).
    pub group_singular: &'static str,
    /// Resource collection segment (`packages`).
    pub resource_plural: &'static str,
    /// Resource singular, used for `<resource>id` attributes (`package`).
    pub resource_singular: &'static str,
}

impl RegistryMeta {
    /// `xid` of a group.
    pub fn group_xid(&self, group_id: &str) -> String {
        format!("/{}/{}", self.group_plural, group_id)
    }

    /// `xid` of a resource.
    pub fn resource_xid(&self, group_id: &str, resource_id: &str) -> String {
        format!("/{}/{}/{}/{}", self.group_plural, group_id, self.resource_plural, resource_id)
    }

    /// `xid` of a version.
    pub fn version_xid(&self, group_id: &str, resource_id: &str, version_id: &str) -> String {
        format!("{}/versions/{}", self.resource_xid(group_id, resource_id), version_id)
    }

    /// Attribute key carrying the group identifier (`<group>id`).
    pub fn group_id_attr(&self) -> String {
        format!("{}id", self.group_singular)
    }

    /// Attribute key carrying the resource identifier (`<resource>id`).
    pub fn resource_id_attr(&self) -> String {
        format!("{}id", self.resource_singular)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NPM: RegistryMeta = RegistryMeta {
        registry_id: "npm-wrapper",
        group_plural: "noderegistries",
        group_singular: "noderegistry",
        resource_plural: "packages",
        resource_singular: "package",
    };

    #[test]
    fn xids_compose_hierarchically() {
        assert_eq!(NPM.group_xid("npmjs.org"), "/noderegistries/npmjs.org");
        assert_eq!(
            NPM.resource_xid("npmjs.org", "express"),
            "/noderegistries/npmjs.org/packages/express"
        );
        assert_eq!(
            NPM.version_xid("npmjs.org", "express", "4.0.0"),
            "/noderegistries/npmjs.org/packages/express/versions/4.0.0"
        );
    }

    #[test]
    fn id_attribute_keys() {
        assert_eq!(NPM.group_id_attr(), "noderegistryid");
        assert_eq!(NPM.resource_id_attr(), "packageid");
    }
}
