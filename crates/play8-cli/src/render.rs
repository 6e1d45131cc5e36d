use chrono::Utc;
use play8_core::models::{
    Card, ChatMessage, ConversationSummary, PlanColumns, PlanItem, Role, StudioCard,
    StudioCatalog,
};

pub fn print_conversations(conversations: &[ConversationSummary]) {
    if conversations.is_empty() {
        println!("No conversations yet.");
        return;
    }
    let now = Utc::now();
    for (index, conversation) in conversations.iter().enumerate() {
        println!(
            "{:>3}. {:<40} {:>10}  {}",
            index + 1,
            conversation.display_title(),
            conversation.recency_label(now),
            conversation.id
        );
    }
}

pub fn print_transcript(messages: &[ChatMessage]) {
    for message in messages {
        let speaker = match message.role() {
            Role::User => "you",
            Role::Assistant => "coach",
        };
        println!("{speaker}> {}", message.content());
    }
}

pub fn print_cards(cards: &[Card]) {
    if cards.is_empty() {
        println!("No cards in this conversation.");
        return;
    }
    for (index, card) in cards.iter().enumerate() {
        let progress = card.progress();
        let saved = if card.content_block_id.is_some() {
            ""
        } else {
            " (unsaved)"
        };
        println!(
            "[{}] {} · {} · {}/{} steps{saved}",
            index + 1,
            card.title(),
            card.content.category.label(),
            progress.checked,
            progress.total
        );
        let checked = card.checked_steps.as_deref().unwrap_or_default();
        for (step_index, step) in card.steps().iter().enumerate() {
            let mark = if checked.get(step_index).copied().unwrap_or(false) {
                'x'
            } else {
                ' '
            };
            println!("      {}. [{mark}] {step}", step_index + 1);
        }
    }
}

pub fn print_board(board: &PlanColumns) {
    print_column("To do", &board.todo);
    print_column("In progress", &board.in_progress);
    print_column("Complete", &board.complete);
}

fn print_column(name: &str, items: &[PlanItem]) {
    println!("{name} ({})", items.len());
    for item in items {
        let progress = item.progress();
        println!(
            "  - {} [{}/{}]  {}",
            item.content.title, progress.checked, progress.total, item.id
        );
    }
}

pub fn print_catalog(catalog: &StudioCatalog) {
    for (category, cards) in catalog.by_category() {
        println!("{}", category.label());
        for card in cards {
            print_studio_card(card);
        }
    }
}

pub fn print_suggestions(cards: &[&StudioCard]) {
    if cards.is_empty() {
        return;
    }
    println!("Related cards:");
    for card in cards {
        print_studio_card(card);
    }
}

fn print_studio_card(card: &StudioCard) {
    let duration = card.content.duration.as_deref().unwrap_or("-");
    println!("  {:<28} {:<8} {}", card.id, duration, card.content.title);
}
