#![allow(missing_docs)] // test only
use proptree::{DictionaryError, PropertyId, Tree, Value};
use proptree_registry::RegistryBuilder;

#[test]
fn dictionary_operations() {
    proptree_logger::try_setup();
    let mut builder = RegistryBuilder::new();
    let text = builder.declare_property("Button", "Text").unwrap();
    let enabled = builder.declare_property("Button", "Enabled").unwrap();
    let template = builder.declare_property("Button", "ContentTemplate").unwrap();
    builder.build().install().unwrap();

    let mut tree = Tree::new();
    let button = tree.create_node("Button");
    let mut properties = tree.dictionary(button);
    assert_eq!(properties.node(), button);
    assert!(properties.is_empty());

    properties.add(text, "Save".into()).unwrap();
    properties.add(text, "Save".into()).unwrap();
    assert_eq!(
        properties.add(text, "Cancel".into()),
        Err(DictionaryError::Conflict {
            property: "Button.Text".into(),
            present: "Save".into(),
            value: "Cancel".into(),
        })
    );
    assert_eq!(properties.try_add(text, "Cancel".into()), Ok(false));
    assert_eq!(properties.try_add(enabled, true.into()), Ok(true));
    assert_eq!(properties.len(), 2);

    assert!(properties.contains_key(text));
    assert!(properties.contains_entry(text, &"Save".into()));
    assert!(!properties.contains_entry(text, &"Cancel".into()));
    assert!(!properties.contains_entry(template, &Value::Null));
    assert_eq!(properties.get(enabled), Some(&Value::Bool(true)));

    assert!(!properties.remove_entry(enabled, &false.into()));
    assert!(properties.remove_entry(enabled, &true.into()));
    assert!(!properties.remove(enabled));
    assert_eq!(properties.keys().collect::<Vec<_>>(), [text]);
    assert_eq!(properties.values().cloned().collect::<Vec<_>>(), [Value::from("Save")]);

    properties.insert(text, "Cancel".into()).unwrap();
    assert_eq!(properties.get(text), Some(&Value::from("Cancel")));

    let unassignable = PropertyId::pack(0, 0);
    assert_eq!(
        properties.insert(unassignable, Value::Null),
        Err(DictionaryError::Unassignable(unassignable))
    );
    assert_eq!(
        properties.try_add(unassignable, Value::Null),
        Err(DictionaryError::Unassignable(unassignable))
    );

    properties.extend([(enabled, Value::from(false)), (text, Value::from("Ok"))]);
    assert_eq!((&properties).into_iter().count(), 2);

    let error = properties.add(enabled, true.into()).unwrap_err();
    assert_eq!(
        error.to_string(),
        "property Button.Enabled is already set to Bool(false), cannot add Bool(true)"
    );

    properties.clear();
    assert!(properties.is_empty());

    let literal = tree.create_node("Literal");
    let mut properties = tree.dictionary(button);
    properties.insert(template, Value::Template(literal)).unwrap();
    properties.clear();
    assert!(tree.get(literal).is_none());
}

#[test]
#[should_panic(expected = "does not exist")]
fn removed_nodes_have_no_dictionary() {
    let mut tree = Tree::new();
    let node = tree.create_node("Button");
    tree.remove_subtree(node);
    tree.dictionary(node);
}
