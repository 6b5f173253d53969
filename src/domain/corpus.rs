use serde::{Deserialize, Serialize};

use crate::domain::classification::ClassificationInput;

/// One child sentence of a corpus group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChildSentence {
    pub sent_id:   String,
    pub sent_text: String,
}

/// One input row: a topic and the sentences to classify against it.
/// Read from the corpus and never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorpusGroup {
    /// Zero-based row position in the input file.
    pub index:     usize,
    pub group_key: String,
    pub topic:     String,
    pub children:  Vec<ChildSentence>,
}

impl CorpusGroup {
    /// Expand children into classifier inputs, repeating the topic per child.
    pub fn inputs(&self) -> Vec<ClassificationInput> {
        self.children
            .iter()
            .map(|c| ClassificationInput::new(self.topic.clone(), c.sent_text.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inputs_repeat_topic_in_order() {
        let group = CorpusGroup {
            index:     0,
            group_key: "g".into(),
            topic:     "zoos".into(),
            children:  vec![
                ChildSentence { sent_id: "s1".into(), sent_text: "a".into() },
                ChildSentence { sent_id: "s2".into(), sent_text: "b".into() },
            ],
        };
        let inputs = group.inputs();
        assert_eq!(inputs.len(), 2);
        assert!(inputs.iter().all(|i| i.topic == "zoos"));
        assert_eq!(inputs[1].sentence, "b");
    }
}
