//! Group and blueprint definitions as the evaluator holds them.
//!
//! A group's fields and methods are fixed when its declaration runs.
//! `do Blueprint for Group` attaches a separate implementation table; each
//! blueprint may be implemented at most once per group, and implementation
//! methods take precedence over same-named group methods.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use marrow_core::ast::{
    BlueprintDeclaration, FieldDeclaration, GroupDeclaration, MethodSignature, TaskDeclaration,
};

use crate::error::RuntimeError;

type MethodTable = BTreeMap<String, Rc<TaskDeclaration>>;

#[derive(Debug)]
pub struct GroupDefinition {
    pub name: String,
    pub fields: Vec<FieldDeclaration>,
    methods: MethodTable,
    implementations: RefCell<BTreeMap<String, MethodTable>>,
}

impl GroupDefinition {
    pub fn from_declaration(decl: &GroupDeclaration) -> Self {
        GroupDefinition {
            name: decl.name.clone(),
            fields: decl.fields.clone(),
            methods: decl
                .methods
                .iter()
                .map(|m| (m.name.clone(), Rc::clone(m)))
                .collect(),
            implementations: RefCell::new(BTreeMap::new()),
        }
    }

    /// Attach the methods of a `do` block.
    pub fn implement(
        &self,
        blueprint: &str,
        methods: &[Rc<TaskDeclaration>],
    ) -> Result<(), RuntimeError> {
        let mut implementations = self.implementations.borrow_mut();
        if implementations.contains_key(blueprint) {
            return Err(RuntimeError::DuplicateImplementation {
                group: self.name.clone(),
                blueprint: blueprint.to_string(),
            });
        }
        let table = methods
            .iter()
            .map(|m| (m.name.clone(), Rc::clone(m)))
            .collect();
        implementations.insert(blueprint.to_string(), table);
        Ok(())
    }

    /// Blueprints implemented so far, sorted by name.
    pub fn blueprints(&self) -> Vec<String> {
        self.implementations.borrow().keys().cloned().collect()
    }

    /// Resolve a method: implementation tables first, then the group's own.
    pub fn find_method(&self, name: &str) -> Option<Rc<TaskDeclaration>> {
        let implementations = self.implementations.borrow();
        implementations
            .values()
            .find_map(|table| table.get(name).cloned())
            .or_else(|| self.methods.get(name).cloned())
    }
}

#[derive(Debug)]
pub struct BlueprintDefinition {
    pub name: String,
    pub signatures: Vec<MethodSignature>,
}

impl BlueprintDefinition {
    pub fn from_declaration(decl: &BlueprintDeclaration) -> Self {
        BlueprintDefinition {
            name: decl.name.clone(),
            signatures: decl.signatures.clone(),
        }
    }

    pub fn signature(&self, method: &str) -> Option<&MethodSignature> {
        self.signatures.iter().find(|s| s.name == method)
    }
}
